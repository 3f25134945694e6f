//! Skitii CLI - Command-line interface for the Skitii engine
//!
//! Commands:
//! - simulate: Run a deterministic session and write its export document
//! - tracks: List the track catalog
//! - recommend: Show the selector's decision and queue for a reading
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skitii_engine::selector::recommendation_reason;
use skitii_engine::types::SessionExport;
use skitii_engine::{
    BiofeedbackEngine, EngineConfig, EngineError, PatientIdentity, StaticIdentity, Track,
    TrackCatalog, TrackSelector, Zone, ENGINE_VERSION, PRODUCER_NAME,
};

/// Skitii - adaptive biofeedback engine for music-therapy sessions
#[derive(Parser)]
#[command(name = "skitii")]
#[command(author = "Skitii Health")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Simulate and inspect adaptive music-therapy sessions", long_about = None)]
struct Cli {
    /// Log engine activity to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a deterministic session and write its export document
    Simulate {
        /// Number of ticks to run
        #[arg(long, default_value = "60")]
        ticks: u64,

        /// Signal generator seed (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Patient id recorded in the session
        #[arg(long, default_value = "PT001")]
        patient: String,

        /// Patient display name
        #[arg(long, default_value = "Demo Patient")]
        name: String,

        /// Pin readings to a zone from a tick on, e.g. low@12 (use off@T to release)
        #[arg(long = "zone", value_parser = parse_zone_at)]
        zones: Vec<(u64, Option<Zone>)>,

        /// Report a pain score at a tick, e.g. 7@0
        #[arg(long = "pain", value_parser = parse_pain_at)]
        pains: Vec<(u64, i32)>,

        /// Keep the player paused (no track adaptation)
        #[arg(long)]
        paused: bool,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Track catalog file (JSON array of tracks)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output file or directory (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        format: OutputFormat,
    },

    /// List the track catalog
    Tracks {
        /// Track catalog file (JSON array of tracks)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the selector's decision and queue for a reading
    Recommend {
        /// Reading value
        #[arg(long)]
        value: u32,

        /// Id of the track currently playing
        #[arg(long)]
        current: Option<String>,

        /// Track catalog file (JSON array of tracks)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check an engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a track catalog file
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .try_init();
}

fn run(cli: Cli) -> Result<(), SkitiiCliError> {
    match cli.command {
        Commands::Simulate {
            ticks,
            seed,
            patient,
            name,
            zones,
            pains,
            paused,
            config,
            catalog,
            output,
            format,
        } => {
            let plan = SimulationPlan {
                ticks,
                seed,
                patient: PatientIdentity::new(patient, name, 0),
                zones,
                pains,
                paused,
            };
            cmd_simulate(plan, config.as_deref(), catalog.as_deref(), &output, format)
        }

        Commands::Tracks { catalog, json } => cmd_tracks(catalog.as_deref(), json),

        Commands::Recommend {
            value,
            current,
            catalog,
            json,
        } => cmd_recommend(value, current.as_deref(), catalog.as_deref(), json),

        Commands::Doctor {
            config,
            catalog,
            json,
        } => cmd_doctor(config.as_deref(), catalog.as_deref(), json),
    }
}

struct SimulationPlan {
    ticks: u64,
    seed: Option<u64>,
    patient: PatientIdentity,
    zones: Vec<(u64, Option<Zone>)>,
    pains: Vec<(u64, i32)>,
    paused: bool,
}

fn cmd_simulate(
    plan: SimulationPlan,
    config: Option<&Path>,
    catalog: Option<&Path>,
    output: &Path,
    format: OutputFormat,
) -> Result<(), SkitiiCliError> {
    let mut config = load_config(config)?;
    if plan.seed.is_some() {
        config.seed = plan.seed;
    }

    let mut engine = BiofeedbackEngine::builder(config)
        .catalog(load_catalog(catalog)?)
        .identity(Box::new(StaticIdentity::signed_in(plan.patient)))
        .build()?;

    if !plan.paused {
        engine.play();
    }
    engine.start_session()?;

    for tick in 0..=plan.ticks {
        for (_, zone) in plan.zones.iter().filter(|(at, _)| *at == tick) {
            match zone {
                Some(zone) => {
                    engine.set_manual_mode(true);
                    engine.set_manual_zone(*zone);
                }
                None => engine.set_manual_mode(false),
            }
        }
        for (_, score) in plan.pains.iter().filter(|(at, _)| *at == tick) {
            engine.set_pain_score(*score);
        }
        if tick < plan.ticks {
            engine.tick();
        }
    }

    let record = engine.end_session().ok_or(SkitiiCliError::NoSession)?;
    engine.shutdown();
    info!(
        session_id = %record.session_id,
        label = %record.improvement_label(),
        duration = %record.formatted_duration(),
        "simulation finished"
    );

    let export = engine.export_session().ok_or(SkitiiCliError::NoSession)?;
    let data = format_export(&export, &format)?;

    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else if output.is_dir() {
        fs::write(output.join(export.file_name()), data)?;
    } else {
        fs::write(output, data)?;
    }

    Ok(())
}

fn cmd_tracks(catalog: Option<&Path>, json: bool) -> Result<(), SkitiiCliError> {
    let catalog = load_catalog(catalog)?;

    if json {
        println!("{}", serde_json::to_string_pretty(catalog.tracks())?);
        return Ok(());
    }

    println!("Track Catalog ({} tracks)", catalog.len());
    println!("=========================");
    for track in catalog.tracks() {
        println!(
            "  {:<10} {:<16} {:>3} BPM  {:>2}-{:<2}  {:>5}  {}",
            track.id,
            track.title,
            track.tempo,
            track.valid_range.0,
            track.valid_range.1,
            format_duration(track.duration_seconds),
            track.therapy_goal
        );
    }
    Ok(())
}

fn cmd_recommend(
    value: u32,
    current: Option<&str>,
    catalog: Option<&Path>,
    json: bool,
) -> Result<(), SkitiiCliError> {
    let selector = TrackSelector::new(load_catalog(catalog)?);
    let current: Option<Track> = match current {
        Some(id) => Some(
            selector
                .catalog()
                .get(id)
                .cloned()
                .ok_or_else(|| EngineError::UnknownTrack(id.to_string()))?,
        ),
        None => None,
    };

    let zone = Zone::classify(value);
    let selection = selector.select(value, zone, current.as_ref(), chrono::Utc::now());
    let queue: Vec<QueueEntry> = selector
        .recommend(value, Some(&selection.track))
        .into_iter()
        .map(|track| QueueEntry {
            reason: recommendation_reason(&track, value).to_string(),
            track,
        })
        .collect();

    let report = RecommendReport {
        value,
        zone,
        track: selection.track,
        switched: selection.adaptation.is_some(),
        reason: selection.adaptation.map(|event| event.reason),
        queue,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Reading {} ({} zone)", report.value, report.zone.as_str());
    if report.switched {
        println!("Switch to: {} ({})", report.track.title, report.track.id);
    } else {
        println!("Keep playing: {} ({})", report.track.title, report.track.id);
    }
    if let Some(reason) = &report.reason {
        println!("  \"{}\"", reason);
    }
    println!("\nUp next:");
    for entry in &report.queue {
        println!("  - {} ({})", entry.track.title, entry.reason);
    }
    Ok(())
}

fn cmd_doctor(
    config: Option<&Path>,
    catalog: Option<&Path>,
    json: bool,
) -> Result<(), SkitiiCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Skitii engine version {}", ENGINE_VERSION),
    });

    if let Some(path) = config {
        let check = match load_config(Some(path)) {
            Ok(config) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (reading every {} ticks, window {})",
                    config.signal_period_ticks, config.window_size
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            },
        };
        checks.push(check);
    }

    let catalog_check = match load_catalog(catalog) {
        Ok(catalog) => DoctorCheck {
            name: "catalog".to_string(),
            status: if catalog.len() < 2 {
                CheckStatus::Warning
            } else {
                CheckStatus::Ok
            },
            message: format!(
                "{} tracks ({} calming, {} uplifting)",
                catalog.len(),
                catalog.calming().count(),
                catalog.uplifting().count()
            ),
        },
        Err(e) => DoctorCheck {
            name: "catalog".to_string(),
            status: CheckStatus::Error,
            message: CliError::from(e).message,
        },
    };
    checks.push(catalog_check);

    for (name, stream) in [("stdin", atty::Stream::Stdin), ("stdout", atty::Stream::Stdout)] {
        let message = if atty::is(stream) {
            format!("{} is a TTY", name)
        } else {
            format!("{} is a pipe", name)
        };
        checks.push(DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message,
        });
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Skitii Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(SkitiiCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<EngineConfig, SkitiiCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn load_catalog(path: Option<&Path>) -> Result<TrackCatalog, SkitiiCliError> {
    match path {
        Some(path) => Ok(TrackCatalog::from_json(&fs::read_to_string(path)?)?),
        None => Ok(TrackCatalog::default()),
    }
}

fn format_export(export: &SessionExport, format: &OutputFormat) -> Result<String, SkitiiCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(export)?),
        OutputFormat::JsonPretty => Ok(export.to_json_pretty()?),
    }
}

fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn split_at_tick(s: &str) -> Result<(&str, u64), String> {
    let (value, tick) = s
        .split_once('@')
        .ok_or_else(|| format!("expected VALUE@TICK, got '{}'", s))?;
    let tick = tick
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid tick in '{}'", s))?;
    Ok((value.trim(), tick))
}

fn parse_zone_at(s: &str) -> Result<(u64, Option<Zone>), String> {
    let (zone, tick) = split_at_tick(s)?;
    if zone.eq_ignore_ascii_case("off") {
        return Ok((tick, None));
    }
    let zone = zone.parse::<Zone>().map_err(|e| e.to_string())?;
    Ok((tick, Some(zone)))
}

fn parse_pain_at(s: &str) -> Result<(u64, i32), String> {
    let (score, tick) = split_at_tick(s)?;
    let score = score
        .parse::<i32>()
        .map_err(|_| format!("invalid pain score in '{}'", s))?;
    Ok((tick, score))
}

// Error types

#[derive(Debug)]
enum SkitiiCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoSession,
    DoctorFailed,
}

impl From<io::Error> for SkitiiCliError {
    fn from(e: io::Error) -> Self {
        SkitiiCliError::Io(e)
    }
}

impl From<EngineError> for SkitiiCliError {
    fn from(e: EngineError) -> Self {
        SkitiiCliError::Engine(e)
    }
}

impl From<serde_json::Error> for SkitiiCliError {
    fn from(e: serde_json::Error) -> Self {
        SkitiiCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SkitiiCliError> for CliError {
    fn from(e: SkitiiCliError) -> Self {
        match e {
            SkitiiCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SkitiiCliError::Engine(e) => {
                let hint = match &e {
                    EngineError::InvalidCatalog(_) => {
                        "Run 'skitii tracks --json' for a valid catalog"
                    }
                    EngineError::InvalidConfig(_) => {
                        "Run 'skitii doctor --config <file>' for details"
                    }
                    EngineError::UnknownTrack(_) => "Run 'skitii tracks' to list track ids",
                    _ => "Check the input values",
                };
                CliError {
                    code: "ENGINE_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            SkitiiCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SkitiiCliError::NoSession => CliError {
                code: "NO_SESSION".to_string(),
                message: "No session to export".to_string(),
                hint: None,
            },
            SkitiiCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct QueueEntry {
    track: Track,
    reason: String,
}

#[derive(serde::Serialize)]
struct RecommendReport {
    value: u32,
    zone: Zone,
    track: Track,
    switched: bool,
    reason: Option<String>,
    queue: Vec<QueueEntry>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_zone_at() {
        assert_eq!(parse_zone_at("low@12").unwrap(), (12, Some(Zone::Low)));
        assert_eq!(parse_zone_at("OFF@30").unwrap(), (30, None));
        assert!(parse_zone_at("calm@3").is_err());
        assert!(parse_zone_at("high").is_err());
    }

    #[test]
    fn test_parse_pain_at() {
        assert_eq!(parse_pain_at("7@0").unwrap(), (0, 7));
        assert!(parse_pain_at("x@0").is_err());
        assert!(parse_pain_at("7@-1").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(300), "5:00");
        assert_eq!(format_duration(65), "1:05");
    }
}
