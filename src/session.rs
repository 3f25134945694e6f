//! Session recording
//!
//! [`SessionRecorder`] owns the Idle/Active session state machine. While a
//! session is active it accumulates duration, the readings seen, pain-score
//! reports and track play intervals; ending the session turns all of that
//! into a [`SessionRecord`] for history and freezes an export document.

use crate::config::RestartPolicy;
use crate::error::EngineError;
use crate::identity::PatientIdentity;
use crate::types::{
    ExportMetrics, MusicPlayedEntry, PainScoreEntry, Reading, SessionExport, SessionRecord,
    SessionStatus, WindowMetrics,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Highest pain score a patient can report
pub const MAX_PAIN_SCORE: u8 = 10;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Active,
}

/// Serializable view of the session for the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub is_session_active: bool,
    pub current_session_id: Option<String>,
    pub session_duration: u64,
    pub pain_score_start: Option<u8>,
    pub pain_score_current: u8,
    pub pain_score_history: Vec<PainScoreEntry>,
}

/// Pain scores reported since the last session start
#[derive(Debug, Clone)]
struct PainScores {
    start: Option<u8>,
    current: u8,
    history: Vec<PainScoreEntry>,
}

impl PainScores {
    fn new(default: u8) -> Self {
        Self {
            start: None,
            current: default,
            history: Vec::new(),
        }
    }

    /// Start score, or the current one if the patient never reported
    fn start_or_current(&self) -> u8 {
        self.start.unwrap_or(self.current)
    }

    fn improvement(&self) -> i32 {
        i32::from(self.start_or_current()) - i32::from(self.current)
    }
}

/// Track currently being timed
#[derive(Debug, Clone)]
struct OpenInterval {
    title: String,
    started_at: DateTime<Utc>,
}

impl OpenInterval {
    fn close(&self, at: DateTime<Utc>) -> MusicPlayedEntry {
        MusicPlayedEntry {
            track: self.title.clone(),
            start_time: self.started_at,
            duration_seconds: seconds_between(self.started_at, at),
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveSession {
    session_id: String,
    started_at: DateTime<Utc>,
    duration_seconds: u64,
    readings: Vec<Reading>,
    /// Sequence number of the last captured reading
    last_captured: u64,
    music_played: Vec<MusicPlayedEntry>,
    open_track: Option<OpenInterval>,
}

impl ActiveSession {
    fn music_until(&self, at: DateTime<Utc>) -> Vec<MusicPlayedEntry> {
        let mut music = self.music_played.clone();
        if let Some(open) = &self.open_track {
            music.push(open.close(at));
        }
        music
    }
}

/// Idle/Active session state machine
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    active: Option<ActiveSession>,
    /// Export of the most recently ended session
    last_ended: Option<SessionExport>,
    pain: PainScores,
    default_pain_score: u8,
    restart_policy: RestartPolicy,
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new(5, RestartPolicy::default())
    }
}

impl SessionRecorder {
    pub fn new(default_pain_score: u8, restart_policy: RestartPolicy) -> Self {
        let default_pain_score = default_pain_score.min(MAX_PAIN_SCORE);
        Self {
            active: None,
            last_ended: None,
            pain: PainScores::new(default_pain_score),
            default_pain_score,
            restart_policy,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.session_id.as_str())
    }

    /// Logical seconds the active session has been running
    pub fn duration_seconds(&self) -> u64 {
        self.active.as_ref().map_or(0, |s| s.duration_seconds)
    }

    pub fn pain_score_start(&self) -> Option<u8> {
        self.pain.start
    }

    pub fn pain_score_current(&self) -> u8 {
        self.pain.current
    }

    pub fn pain_score_history(&self) -> &[PainScoreEntry] {
        &self.pain.history
    }

    /// Readings captured by the active session
    pub fn readings(&self) -> &[Reading] {
        self.active.as_ref().map_or(&[], |s| s.readings.as_slice())
    }

    /// Start a new session.
    ///
    /// `latest` is the newest reading with its sequence number, captured as
    /// the session's first reading. `now_playing` opens the first track
    /// interval. Starting while a session is active either discards it or is
    /// refused, depending on the restart policy.
    pub fn start_session(
        &mut self,
        at: DateTime<Utc>,
        latest: Option<(u64, &Reading)>,
        now_playing: Option<&str>,
    ) -> Result<String, EngineError> {
        if let Some(previous) = &self.active {
            match self.restart_policy {
                RestartPolicy::Reject => {
                    return Err(EngineError::SessionAlreadyActive(previous.session_id.clone()));
                }
                RestartPolicy::Restart => {
                    warn!(
                        session_id = %previous.session_id,
                        readings = previous.readings.len(),
                        pain_updates = self.pain.history.len(),
                        "restarting session; discarding in-progress data"
                    );
                }
            }
        }

        let session_id = format!(
            "SES-{}-{}",
            at.timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8]
        );

        let mut session = ActiveSession {
            session_id: session_id.clone(),
            started_at: at,
            duration_seconds: 0,
            readings: Vec::new(),
            last_captured: 0,
            music_played: Vec::new(),
            open_track: now_playing.map(|title| OpenInterval {
                title: title.to_string(),
                started_at: at,
            }),
        };
        if let Some((sequence, reading)) = latest {
            session.readings.push(reading.clone());
            session.last_captured = sequence;
        }

        self.pain = PainScores::new(self.default_pain_score);
        self.active = Some(session);
        self.last_ended = None;

        info!(session_id = %session_id, "session started");
        Ok(session_id)
    }

    /// Session timer: add `seconds` of duration and capture `latest` if it
    /// has not been captured yet
    pub fn tick(&mut self, seconds: u64, latest: Option<(u64, &Reading)>) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        session.duration_seconds += seconds;

        if let Some((sequence, reading)) = latest {
            if sequence > session.last_captured {
                session.readings.push(reading.clone());
                session.last_captured = sequence;
            }
        }
    }

    /// Record a pain score, clamped to 0-10. The first score after a session
    /// start becomes the starting score. Returns the stored score.
    pub fn set_pain_score(&mut self, score: i32, at: DateTime<Utc>) -> u8 {
        let score = score.clamp(0, i32::from(MAX_PAIN_SCORE)) as u8;

        if self.pain.start.is_none() {
            self.pain.start = Some(score);
        }
        self.pain.current = score;
        self.pain.history.push(PainScoreEntry {
            timestamp: at,
            score,
        });
        score
    }

    /// The playing track changed (or playback started) at `at`. Closes the
    /// open interval and, when `title` is given, opens a new one.
    pub fn track_changed(&mut self, title: Option<&str>, at: DateTime<Utc>) {
        let Some(session) = self.active.as_mut() else {
            return;
        };

        if let Some(open) = session.open_track.take() {
            session.music_played.push(open.close(at));
        }
        session.open_track = title.map(|title| OpenInterval {
            title: title.to_string(),
            started_at: at,
        });
    }

    /// Whether a track interval is being timed
    pub fn is_timing_track(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|s| s.open_track.is_some())
    }

    /// End the active session.
    ///
    /// Returns `None`, leaving state untouched, when no session is active or
    /// nobody is signed in.
    pub fn end_session(
        &mut self,
        patient: Option<&PatientIdentity>,
        metrics: WindowMetrics,
        at: DateTime<Utc>,
    ) -> Option<SessionRecord> {
        let Some(patient) = patient else {
            debug!("end_session without a signed-in patient");
            return None;
        };
        let Some(mut session) = self.active.take() else {
            debug!("end_session with no active session");
            return None;
        };

        if let Some(open) = session.open_track.take() {
            session.music_played.push(open.close(at));
        }

        let record = SessionRecord {
            session_id: session.session_id.clone(),
            patient_id: patient.patient_id.clone(),
            start_time: session.started_at,
            duration_seconds: session.duration_seconds,
            metrics,
            pain_score_start: self.pain.start_or_current(),
            pain_score_end: self.pain.current,
            improvement: self.pain.improvement(),
            tracks_played: session
                .music_played
                .iter()
                .map(|m| m.track.clone())
                .collect(),
            status: SessionStatus::Completed,
        };

        self.last_ended = Some(self.build_export(
            &session,
            &patient.patient_id,
            metrics,
            session.music_played.clone(),
            at,
        ));

        info!(
            session_id = %record.session_id,
            duration_seconds = record.duration_seconds,
            improvement = record.improvement,
            "session ended"
        );
        Some(record)
    }

    /// Export the active session, or the one that just ended.
    ///
    /// Never mutates state. Returns `None` when nobody is signed in, there
    /// is no session to export, or the ended session belongs to another
    /// patient.
    pub fn export_session(
        &self,
        patient: Option<&PatientIdentity>,
        metrics: WindowMetrics,
        at: DateTime<Utc>,
    ) -> Option<SessionExport> {
        let patient = patient?;

        match &self.active {
            Some(session) => Some(self.build_export(
                session,
                &patient.patient_id,
                metrics,
                session.music_until(at),
                at,
            )),
            None => self
                .last_ended
                .as_ref()
                .filter(|export| export.patient_id == patient.patient_id)
                .cloned(),
        }
    }

    /// Drop the frozen export of the last ended session
    pub fn forget_ended(&mut self) {
        self.last_ended = None;
    }

    fn build_export(
        &self,
        session: &ActiveSession,
        patient_id: &str,
        metrics: WindowMetrics,
        music_played: Vec<MusicPlayedEntry>,
        end_time: DateTime<Utc>,
    ) -> SessionExport {
        SessionExport {
            session_id: session.session_id.clone(),
            patient_id: patient_id.to_string(),
            start_time: session.started_at,
            end_time,
            duration_seconds: session.duration_seconds,
            metrics: ExportMetrics {
                avg_hrv: metrics.avg,
                min_hrv: metrics.min,
                max_hrv: metrics.max,
                hrv_variability: metrics.variability,
                pain_score_start: self.pain.start_or_current(),
                pain_score_end: self.pain.current,
                improvement: self.pain.improvement(),
            },
            hrv_readings: session.readings.clone(),
            pain_score_updates: self.pain.history.clone(),
            music_played,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            is_session_active: self.is_active(),
            current_session_id: self.session_id().map(str::to_string),
            session_duration: self.duration_seconds(),
            pain_score_start: self.pain.start,
            pain_score_current: self.pain.current,
            pain_score_history: self.pain.history.clone(),
        }
    }
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_seconds()).unwrap_or(0)
}
