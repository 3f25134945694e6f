//! Engine orchestration
//!
//! This module provides the public API the UI layer talks to. It owns every
//! component, drives them from a single logical clock and exposes the query
//! and action surface.
//!
//! Per tick, due tasks run in a fixed order and each runs to completion:
//! 1. Signal - generate a reading, update the window, let the player adapt
//! 2. Playback - advance the playing track
//! 3. SessionTimer - advance the session and capture the newest reading

use crate::catalog::TrackCatalog;
use crate::clock::{Scheduler, TaskKind};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::history::{InMemorySessionStore, SessionStore};
use crate::identity::{IdentityProvider, StaticIdentity};
use crate::player::{PlaybackState, Player};
use crate::selector::{recommendation_reason, TrackSelector};
use crate::session::{SessionRecorder, SessionView};
use crate::signal::SignalGenerator;
use crate::types::{Reading, SessionExport, SessionRecord, Track, Trend, WindowMetrics, Zone};
use crate::window::RollingWindowAggregator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything the UI can read, in one serializable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    /// Logical time in ticks
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub current_reading: Option<Reading>,
    pub reading_history: Vec<Reading>,
    pub trend: Trend,
    pub zone: Zone,
    pub device_connected: bool,
    pub is_stress_alert_visible: bool,
    pub metrics: WindowMetrics,
    pub is_manual_mode: bool,
    pub manual_zone: Option<Zone>,
    pub playback: PlaybackState,
    pub session: SessionView,
}

/// Builder for [`BiofeedbackEngine`]
pub struct EngineBuilder {
    config: EngineConfig,
    catalog: TrackCatalog,
    identity: Box<dyn IdentityProvider>,
    store: Box<dyn SessionStore>,
    anchor: Option<DateTime<Utc>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            catalog: TrackCatalog::default(),
            identity: Box::new(StaticIdentity::anonymous()),
            store: Box::new(InMemorySessionStore::new()),
            anchor: None,
        }
    }

    pub fn catalog(mut self, catalog: TrackCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn identity(mut self, identity: Box<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn store(mut self, store: Box<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    /// Wall-clock time of tick 0 (defaults to now)
    pub fn anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn build(self) -> Result<BiofeedbackEngine, EngineError> {
        let config = self.config;
        config.validate()?;

        let mut scheduler = Scheduler::new(
            self.anchor.unwrap_or_else(Utc::now),
            config.tick_seconds,
            [
                config.signal_period_ticks,
                config.playback_period_ticks,
                config.session_period_ticks,
            ],
        );
        scheduler.arm(TaskKind::Signal);

        let generator = match config.seed {
            Some(seed) => SignalGenerator::seeded(seed),
            None => SignalGenerator::new(),
        };

        let player = Player::new(&self.catalog, config.initial_volume);

        Ok(BiofeedbackEngine {
            scheduler,
            generator,
            window: RollingWindowAggregator::new(config.window_size, config.stress_threshold),
            selector: TrackSelector::new(self.catalog),
            player,
            recorder: SessionRecorder::new(config.default_pain_score, config.restart_policy),
            identity: self.identity,
            store: self.store,
            manual_mode: false,
            manual_zone: None,
            config,
        })
    }
}

/// The adaptive biofeedback engine
pub struct BiofeedbackEngine {
    config: EngineConfig,
    scheduler: Scheduler,
    generator: SignalGenerator,
    window: RollingWindowAggregator,
    selector: TrackSelector,
    player: Player,
    recorder: SessionRecorder,
    identity: Box<dyn IdentityProvider>,
    store: Box<dyn SessionStore>,
    manual_mode: bool,
    manual_zone: Option<Zone>,
}

impl BiofeedbackEngine {
    /// Engine with the default catalog, nobody signed in and an in-memory store
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        EngineBuilder::new(config).build()
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------

    /// Advance logical time by one tick and run every task that falls due
    pub fn tick(&mut self) {
        for task in self.scheduler.tick() {
            match task {
                TaskKind::Signal => self.on_signal(),
                TaskKind::Playback => self.on_playback(),
                TaskKind::SessionTimer => self.on_session_timer(),
            }
        }
    }

    /// Run `ticks` ticks
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Logical time in ticks
    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.scheduler.timestamp()
    }

    /// Stop all periodic work. No component state changes on later ticks.
    pub fn shutdown(&mut self) {
        self.scheduler.halt();
        self.player.pause();
    }

    pub fn is_shut_down(&self) -> bool {
        self.scheduler.is_halted()
    }

    fn on_signal(&mut self) {
        let at = self.scheduler.timestamp();
        let reading = match (self.manual_mode, self.manual_zone) {
            (true, Some(zone)) => self.generator.next_manual(zone, at),
            _ => self.generator.next_auto(self.window.latest(), at),
        };
        self.window.push(reading.clone());

        if let Some(event) = self.player.apply_reading(&self.selector, &reading, at) {
            debug!(
                from = event.from_track.as_ref().map(|t| t.id.as_str()),
                to = %event.to_track.id,
                value = reading.value,
                zone = reading.zone.as_str(),
                "track adapted"
            );
            self.recorder.track_changed(Some(&event.to_track.title), at);
        }
    }

    fn on_playback(&mut self) {
        let seconds = self.config.playback_period_ticks * self.scheduler.tick_seconds();
        if self.player.advance(seconds) {
            self.note_track_change();
        }
    }

    fn on_session_timer(&mut self) {
        let seconds = self.config.session_period_ticks * self.scheduler.tick_seconds();
        let latest = self
            .window
            .latest()
            .map(|r| (self.window.latest_sequence(), r));
        self.recorder.tick(seconds, latest);
    }

    /// Tell the recorder the current track changed: close the old interval
    /// and open one for the new track if it is playing
    fn note_track_change(&mut self) {
        let at = self.scheduler.timestamp();
        let title = self
            .player
            .current_track()
            .filter(|_| self.player.is_playing())
            .map(|t| t.title.clone());
        self.recorder.track_changed(title.as_deref(), at);
    }

    // ------------------------------------------------------------------
    // Signal queries and actions
    // ------------------------------------------------------------------

    pub fn current_reading(&self) -> Option<&Reading> {
        self.window.latest()
    }

    pub fn reading_history(&self) -> Vec<Reading> {
        self.window.history()
    }

    pub fn trend(&self) -> Trend {
        self.window.trend()
    }

    /// Zone of the latest reading (`normal` before the first one)
    pub fn zone(&self) -> Zone {
        self.window.latest().map_or(Zone::Normal, |r| r.zone)
    }

    /// Device flag of the latest reading (`false` before the first one)
    pub fn device_connected(&self) -> bool {
        self.window.latest().is_some_and(|r| r.device_connected)
    }

    pub fn is_stress_alert_visible(&self) -> bool {
        self.window.is_stressed()
    }

    pub fn metrics(&self) -> WindowMetrics {
        self.window.metrics()
    }

    pub fn is_manual_mode(&self) -> bool {
        self.manual_mode
    }

    pub fn manual_zone(&self) -> Option<Zone> {
        self.manual_zone
    }

    /// Hide the stress alert. In manual mode the patient saying they feel
    /// better also moves the override to the normal zone.
    pub fn dismiss_stress_alert(&mut self) {
        self.window.dismiss_stress();
        if self.manual_mode {
            self.manual_zone = Some(Zone::Normal);
        }
    }

    /// Turn the manual zone override on or off; turning it off clears the zone
    pub fn set_manual_mode(&mut self, enabled: bool) {
        self.manual_mode = enabled;
        if !enabled {
            self.manual_zone = None;
        }
        debug!(enabled, "manual mode changed");
    }

    pub fn set_manual_zone(&mut self, zone: Zone) {
        self.manual_zone = Some(zone);
        debug!(zone = zone.as_str(), "manual zone set");
    }

    // ------------------------------------------------------------------
    // Player
    // ------------------------------------------------------------------

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn playback(&self) -> PlaybackState {
        self.player.state()
    }

    pub fn catalog(&self) -> &TrackCatalog {
        self.selector.catalog()
    }

    /// Queue entries paired with why each is recommended for the latest reading
    pub fn queue_with_reasons(&self) -> Vec<(Track, &'static str)> {
        let value = self.window.latest().map(|r| r.value);
        self.player
            .queue()
            .iter()
            .map(|t| {
                let reason =
                    value.map_or("Next in therapy sequence", |v| recommendation_reason(t, v));
                (t.clone(), reason)
            })
            .collect()
    }

    pub fn play(&mut self) {
        if self.scheduler.is_halted() {
            return;
        }
        self.player.play();
        self.scheduler.arm(TaskKind::Playback);
        if self.recorder.is_active() && !self.recorder.is_timing_track() {
            self.note_track_change();
        }
    }

    pub fn pause(&mut self) {
        self.player.pause();
        self.scheduler.disarm(TaskKind::Playback);
    }

    pub fn toggle_play(&mut self) {
        if self.player.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn skip_next(&mut self) {
        if self.player.skip_next() {
            self.note_track_change();
        }
    }

    pub fn skip_previous(&mut self) {
        self.player.skip_previous();
    }

    pub fn set_volume(&mut self, volume: i32) {
        self.player.set_volume(volume);
    }

    /// Play a catalog track by id. Returns `None` for unknown ids.
    pub fn select_track(&mut self, track_id: &str) -> Option<Track> {
        let track = self.selector.catalog().get(track_id)?.clone();
        self.player.select_track(track.clone());
        self.note_track_change();
        Some(track)
    }

    pub fn dismiss_adaptation_alert(&mut self) {
        self.player.dismiss_adaptation_alert();
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub fn session(&self) -> SessionView {
        self.recorder.view()
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn is_session_active(&self) -> bool {
        self.recorder.is_active()
    }

    /// Replace the identity provider (sign-in / sign-out). A different
    /// patient loses access to the export of the last ended session.
    pub fn set_identity_provider(&mut self, identity: Box<dyn IdentityProvider>) {
        let previous = self.identity.current_patient().map(|p| p.patient_id);
        let next = identity.current_patient().map(|p| p.patient_id);
        if previous != next {
            self.recorder.forget_ended();
        }
        self.identity = identity;
    }

    /// Start a session and its timer. Returns the new session id.
    pub fn start_session(&mut self) -> Result<String, EngineError> {
        let at = self.scheduler.timestamp();
        let latest = self
            .window
            .latest()
            .map(|r| (self.window.latest_sequence(), r));
        let now_playing = self
            .player
            .current_track()
            .filter(|_| self.player.is_playing())
            .map(|t| t.title.as_str());

        let session_id = self.recorder.start_session(at, latest, now_playing)?;

        self.scheduler.disarm(TaskKind::SessionTimer);
        self.scheduler.arm(TaskKind::SessionTimer);
        Ok(session_id)
    }

    /// End the active session, store its record and stop its timer.
    /// `None` when no session is active or nobody is signed in.
    pub fn end_session(&mut self) -> Option<SessionRecord> {
        let patient = self.identity.current_patient();
        let metrics = self.window.metrics();
        let at = self.scheduler.timestamp();

        let record = self.recorder.end_session(patient.as_ref(), metrics, at)?;
        self.scheduler.disarm(TaskKind::SessionTimer);
        self.store.add_session(record.clone());
        Some(record)
    }

    /// Record a pain score (clamped to 0-10); returns the stored value
    pub fn set_pain_score(&mut self, score: i32) -> u8 {
        let at = self.scheduler.timestamp();
        self.recorder.set_pain_score(score, at)
    }

    /// Export the active or just-ended session without changing any state
    pub fn export_session(&self) -> Option<SessionExport> {
        let patient = self.identity.current_patient();
        self.recorder
            .export_session(patient.as_ref(), self.window.metrics(), self.scheduler.timestamp())
    }

    /// Stored sessions for the signed-in patient, newest first
    pub fn patient_history(&self) -> Vec<SessionRecord> {
        match self.identity.current_patient() {
            Some(patient) => self.store.sessions_for_patient(&patient.patient_id),
            None => Vec::new(),
        }
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            tick: self.scheduler.now(),
            timestamp: self.scheduler.timestamp(),
            current_reading: self.window.latest().cloned(),
            reading_history: self.window.history(),
            trend: self.window.trend(),
            zone: self.zone(),
            device_connected: self.device_connected(),
            is_stress_alert_visible: self.window.is_stressed(),
            metrics: self.window.metrics(),
            is_manual_mode: self.manual_mode,
            manual_zone: self.manual_zone,
            playback: self.player.state(),
            session: self.recorder.view(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestartPolicy;
    use crate::identity::PatientIdentity;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    fn signed_in() -> Box<dyn IdentityProvider> {
        Box::new(StaticIdentity::signed_in(PatientIdentity::new(
            "PT001",
            "Rajesh Kumar",
            45,
        )))
    }

    fn engine_with(config: EngineConfig) -> BiofeedbackEngine {
        BiofeedbackEngine::builder(config)
            .identity(signed_in())
            .anchor(anchor())
            .build()
            .unwrap()
    }

    fn engine() -> BiofeedbackEngine {
        engine_with(EngineConfig::seeded(42))
    }

    #[test]
    fn test_readings_every_three_ticks() {
        let mut engine = engine();
        engine.run(2);
        assert!(engine.current_reading().is_none());
        assert_eq!(engine.zone(), Zone::Normal);
        assert!(!engine.device_connected());

        engine.tick();
        let reading = engine.current_reading().unwrap();
        assert_eq!(reading.timestamp, anchor() + chrono::Duration::seconds(3));

        engine.run(6);
        assert_eq!(engine.reading_history().len(), 3);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut engine = engine();
        engine.run(3 * 150);
        assert_eq!(engine.reading_history().len(), 100);
        for reading in engine.reading_history() {
            assert!((20..=80).contains(&reading.value));
        }
    }

    #[test]
    fn test_same_seed_same_run() {
        let mut a = engine();
        let mut b = engine();
        a.run(60);
        b.run(60);
        assert_eq!(a.reading_history(), b.reading_history());
    }

    #[test]
    fn test_immediate_end_session() {
        let mut engine = engine();
        engine.start_session().unwrap();
        assert!(engine.is_session_active());

        let record = engine.end_session().unwrap();
        assert_eq!(record.duration_seconds, 0);
        assert_eq!(record.improvement, 0);
        assert_eq!(record.patient_id, "PT001");
        assert!(!engine.is_session_active());

        let history = engine.patient_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], record);
    }

    #[test]
    fn test_session_duration_and_readings() {
        let mut engine = engine();
        engine.start_session().unwrap();
        engine.run(10);

        assert_eq!(engine.session().session_duration, 10);
        assert_eq!(engine.recorder().readings().len(), 3);

        let record = engine.end_session().unwrap();
        assert_eq!(record.duration_seconds, 10);
        assert_eq!(record.metrics, engine.metrics());

        // Timer is stopped after the session ends
        engine.run(5);
        assert_eq!(engine.session().session_duration, 0);
    }

    #[test]
    fn test_session_captures_reading_present_at_start() {
        let mut engine = engine();
        engine.run(3);
        engine.start_session().unwrap();
        engine.run(2);
        assert_eq!(engine.recorder().readings().len(), 1);
        engine.run(1);
        assert_eq!(engine.recorder().readings().len(), 2);
    }

    #[test]
    fn test_end_session_without_identity() {
        let mut engine = BiofeedbackEngine::builder(EngineConfig::seeded(1))
            .anchor(anchor())
            .build()
            .unwrap();
        engine.start_session().unwrap();
        engine.run(4);

        assert!(engine.end_session().is_none());
        assert!(engine.export_session().is_none());
        assert!(engine.is_session_active());
        assert!(engine.patient_history().is_empty());

        engine.set_identity_provider(signed_in());
        assert!(engine.end_session().is_some());
    }

    #[test]
    fn test_end_session_when_idle() {
        let mut engine = engine();
        assert!(engine.end_session().is_none());
        assert!(engine.export_session().is_none());
    }

    #[test]
    fn test_export_twice_is_stable() {
        let mut engine = engine();
        engine.start_session().unwrap();
        engine.set_pain_score(7);
        engine.run(9);
        engine.set_pain_score(5);

        let first = engine.export_session().unwrap();
        let second = engine.export_session().unwrap();
        assert_eq!(first, second);
        assert!(engine.is_session_active());

        assert_eq!(first.duration_seconds, 9);
        assert_eq!(first.hrv_readings.len(), 3);
        assert_eq!(first.metrics.pain_score_start, 7);
        assert_eq!(first.metrics.pain_score_end, 5);
        assert_eq!(first.metrics.improvement, 2);
        assert_eq!(first.end_time, anchor() + chrono::Duration::seconds(9));
    }

    #[test]
    fn test_export_after_end() {
        let mut engine = engine();
        engine.start_session().unwrap();
        engine.run(6);
        let record = engine.end_session().unwrap();
        engine.run(6);

        let export = engine.export_session().unwrap();
        assert_eq!(export.session_id, record.session_id);
        assert_eq!(export.duration_seconds, 6);
        assert_eq!(export.end_time, anchor() + chrono::Duration::seconds(6));
    }

    #[test]
    fn test_ended_session_not_exported_to_other_patient() {
        let mut engine = engine();
        engine.start_session().unwrap();
        engine.run(6);
        engine.end_session().unwrap();

        engine.set_identity_provider(Box::new(StaticIdentity::signed_in(PatientIdentity::new(
            "PT002",
            "Priya Sharma",
            52,
        ))));
        assert!(engine.export_session().is_none());

        // Signing the first patient back in does not restore the export
        engine.set_identity_provider(signed_in());
        assert!(engine.export_session().is_none());
    }

    #[test]
    fn test_same_patient_keeps_ended_export() {
        let mut engine = engine();
        engine.start_session().unwrap();
        engine.run(3);
        let record = engine.end_session().unwrap();

        engine.set_identity_provider(signed_in());
        let export = engine.export_session().unwrap();
        assert_eq!(export.session_id, record.session_id);
        assert_eq!(export.patient_id, "PT001");
    }

    #[test]
    fn test_pain_score_clamp() {
        let mut engine = engine();
        engine.start_session().unwrap();
        assert_eq!(engine.set_pain_score(15), 10);
        assert_eq!(engine.session().pain_score_current, 10);
        assert_eq!(engine.set_pain_score(-3), 0);
        assert_eq!(engine.session().pain_score_current, 0);
        assert_eq!(engine.session().pain_score_start, Some(10));
    }

    #[test]
    fn test_manual_low_raises_stress() {
        let mut engine = engine();
        engine.set_manual_mode(true);
        engine.set_manual_zone(Zone::Low);

        engine.run(3);
        assert_eq!(engine.zone(), Zone::Low);
        assert!(engine.device_connected());
        assert!(!engine.is_stress_alert_visible());

        engine.run(3);
        assert!(engine.is_stress_alert_visible());

        engine.dismiss_stress_alert();
        assert!(!engine.is_stress_alert_visible());
        assert_eq!(engine.manual_zone(), Some(Zone::Normal));

        engine.run(3);
        assert_eq!(engine.zone(), Zone::Normal);
        assert!(!engine.is_stress_alert_visible());
    }

    #[test]
    fn test_manual_mode_off_clears_zone() {
        let mut engine = engine();
        engine.set_manual_mode(true);
        engine.set_manual_zone(Zone::High);
        engine.set_manual_mode(false);
        assert_eq!(engine.manual_zone(), None);

        // Zone alone does not force readings while manual mode is off
        engine.set_manual_zone(Zone::High);
        engine.run(3);
        let reading = engine.current_reading().unwrap();
        assert_eq!(reading.zone, Zone::classify(reading.value));
    }

    #[test]
    fn test_adaptation_while_playing() {
        let mut engine = engine();
        engine.set_manual_mode(true);
        engine.set_manual_zone(Zone::High);
        engine.play();

        engine.run(3);
        let playback = engine.playback();
        assert_eq!(playback.current_track.unwrap().id, "track_003");
        assert!(playback.show_adaptation_alert);
        let event = playback.last_adaptation.unwrap();
        assert_eq!(event.from_track.unwrap().id, "track_001");
        assert!(event.reason.contains("Uplift"));
        // Playback advanced after the switch within the same tick
        assert_eq!(playback.elapsed_seconds, 1);

        engine.dismiss_adaptation_alert();
        engine.run(3);
        assert!(!engine.playback().show_adaptation_alert);
    }

    #[test]
    fn test_no_adaptation_while_paused() {
        let mut engine = engine();
        engine.set_manual_mode(true);
        engine.set_manual_zone(Zone::High);
        engine.run(3);

        let playback = engine.playback();
        assert_eq!(playback.current_track.unwrap().id, "track_001");
        assert!(playback.last_adaptation.is_none());
        assert_eq!(playback.elapsed_seconds, 0);
    }

    #[test]
    fn test_pause_stops_progress() {
        let mut engine = engine();
        engine.set_manual_mode(true);
        engine.set_manual_zone(Zone::Low);
        engine.play();
        engine.run(30);
        assert_eq!(engine.player().elapsed_seconds(), 30);
        assert_eq!(engine.playback().progress, 10.0);

        engine.pause();
        engine.run(10);
        assert_eq!(engine.player().elapsed_seconds(), 30);

        engine.toggle_play();
        engine.run(1);
        assert_eq!(engine.player().elapsed_seconds(), 31);
    }

    #[test]
    fn test_tracks_played_in_session() {
        let mut engine = engine();
        engine.set_manual_mode(true);
        engine.set_manual_zone(Zone::High);
        engine.play();
        engine.start_session().unwrap();
        engine.run(10);

        let export = engine.export_session().unwrap();
        let music: Vec<(&str, u64)> = export
            .music_played
            .iter()
            .map(|m| (m.track.as_str(), m.duration_seconds))
            .collect();
        assert_eq!(music, vec![("Gentle Waves", 3), ("Uplift", 7)]);

        let record = engine.end_session().unwrap();
        assert_eq!(record.tracks_played, vec!["Gentle Waves", "Uplift"]);
    }

    #[test]
    fn test_play_during_session_opens_interval() {
        let mut engine = engine();
        engine.set_manual_mode(true);
        engine.set_manual_zone(Zone::Low);
        engine.start_session().unwrap();
        engine.run(2);
        engine.play();
        engine.run(4);
        engine.skip_next();
        engine.run(2);

        let record = engine.end_session().unwrap();
        assert_eq!(record.tracks_played, vec!["Gentle Waves", "Breathing Space"]);
    }

    #[test]
    fn test_select_track() {
        let mut engine = engine();
        assert!(engine.select_track("track_404").is_none());

        let track = engine.select_track("track_004").unwrap();
        assert_eq!(track.title, "Deep Rest");
        assert_eq!(engine.playback().current_track.unwrap().id, "track_004");

        engine.set_volume(120);
        assert_eq!(engine.playback().volume, 100);
    }

    #[test]
    fn test_queue_follows_readings() {
        let mut engine = engine();
        engine.set_manual_mode(true);
        engine.set_manual_zone(Zone::High);
        engine.run(3);

        let queue = engine.queue_with_reasons();
        assert!(!queue.is_empty());
        assert!(queue.len() <= 3);
        assert!(queue.iter().all(|(t, _)| t.id != "track_001"));
        assert_eq!(queue[0].0.id, "track_003");
        assert_eq!(queue[0].1, "Matches your current state");
    }

    #[test]
    fn test_restart_policy_reject() {
        let config = EngineConfig {
            restart_policy: RestartPolicy::Reject,
            ..EngineConfig::seeded(3)
        };
        let mut engine = engine_with(config);
        let first = engine.start_session().unwrap();
        engine.run(4);

        assert!(matches!(
            engine.start_session(),
            Err(EngineError::SessionAlreadyActive(_))
        ));
        assert_eq!(engine.session().current_session_id, Some(first));
        assert_eq!(engine.session().session_duration, 4);
    }

    #[test]
    fn test_restart_policy_restart() {
        let mut engine = engine();
        let first = engine.start_session().unwrap();
        engine.run(4);
        let second = engine.start_session().unwrap();

        assert_ne!(first, second);
        assert_eq!(engine.session().session_duration, 0);
        engine.run(1);
        assert_eq!(engine.session().session_duration, 1);
    }

    #[test]
    fn test_shutdown_stops_all_mutation() {
        let mut engine = engine();
        engine.play();
        engine.start_session().unwrap();
        engine.run(6);
        engine.shutdown();

        let before = engine.snapshot();
        engine.run(30);
        engine.play();
        engine.run(30);
        assert_eq!(engine.snapshot(), before);
        assert!(engine.is_shut_down());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut engine = engine();
        engine.run(3);
        let json = serde_json::to_value(engine.snapshot()).unwrap();
        assert_eq!(json["tick"], 3);
        assert!(json["currentReading"]["value"].is_u64());
        assert_eq!(json["playback"]["volume"], 70);
        assert_eq!(json["session"]["isSessionActive"], false);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            window_size: 0,
            ..EngineConfig::default()
        };
        assert!(BiofeedbackEngine::new(config).is_err());
    }
}
