//! Core types for the Skitii engine
//!
//! This module defines the data structures that flow between the engine
//! components: readings, tracks, adaptation events, pain-score entries and
//! the session documents handed to the UI and to persistence.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Readings below this value are classified as [`Zone::Low`]
pub const LOW_ZONE_CEILING: u32 = 30;

/// Readings above this value are classified as [`Zone::High`]
pub const HIGH_ZONE_FLOOR: u32 = 60;

/// Physiological zone of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Stress / anxiety (< 30)
    Low,
    /// Healthy range (30-60)
    Normal,
    /// Relaxed (> 60)
    High,
}

impl Zone {
    /// Classify a reading value into its zone
    pub fn classify(value: u32) -> Self {
        if value < LOW_ZONE_CEILING {
            Zone::Low
        } else if value > HIGH_ZONE_FLOOR {
            Zone::High
        } else {
            Zone::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Low => "low",
            Zone::Normal => "normal",
            Zone::High => "high",
        }
    }
}

impl FromStr for Zone {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Zone::Low),
            "normal" => Ok(Zone::Normal),
            "high" => Ok(Zone::High),
            other => Err(EngineError::InvalidZone(other.to_string())),
        }
    }
}

/// Short-term direction of the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

/// A single physiological reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Signal value (ms), always within the generator's clamp range
    pub value: u32,
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
    /// Zone shown to the patient (manual override wins over classification)
    pub zone: Zone,
    /// Whether the simulated device was connected; informational only
    pub device_connected: bool,
}

/// A therapy track from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub therapy_goal: String,
    /// Tempo in BPM
    pub tempo: u32,
    pub key: String,
    pub mood: String,
    pub duration_seconds: u32,
    /// Inclusive signal range `[min, max]` the track is suited for
    pub valid_range: (u32, u32),
}

impl Track {
    /// Whether `value` lies inside the track's valid range (inclusive)
    pub fn suits(&self, value: u32) -> bool {
        let (min, max) = self.valid_range;
        value >= min && value <= max
    }

    /// Whether `value` lies inside the valid range widened by `margin` on both ends
    pub fn suits_within(&self, value: u32, margin: u32) -> bool {
        let (min, max) = self.valid_range;
        value >= min.saturating_sub(margin) && value <= max.saturating_add(margin)
    }
}

/// Record of an automatic track switch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationEvent {
    /// Patient-facing, non-alarming explanation
    pub reason: String,
    pub from_track: Option<Track>,
    pub to_track: Track,
    pub timestamp: DateTime<Utc>,
}

/// A pain score reported by the patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PainScoreEntry {
    pub timestamp: DateTime<Utc>,
    /// Score in `[0, 10]`
    pub score: u8,
}

/// Rolling statistics over the reading window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowMetrics {
    /// Mean value, rounded to the nearest integer
    pub avg: u32,
    pub min: u32,
    pub max: u32,
    /// Population standard deviation around the rounded mean, one decimal
    pub variability: f64,
}

/// Lifecycle status of a stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

/// Summary of a finished session, as kept in the patient's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub patient_id: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub metrics: WindowMetrics,
    pub pain_score_start: u8,
    pub pain_score_end: u8,
    /// `pain_score_start - pain_score_end`; positive means less pain
    pub improvement: i32,
    /// Titles of the tracks played during the session, in play order
    pub tracks_played: Vec<String>,
    pub status: SessionStatus,
}

impl SessionRecord {
    /// Human-readable pain change, e.g. "↓ 3 points"
    pub fn improvement_label(&self) -> String {
        match self.improvement {
            n if n > 0 => format!("↓ {n} points"),
            n if n < 0 => format!("↑ {} points", n.unsigned_abs()),
            _ => "No change".to_string(),
        }
    }

    /// Duration formatted as "Mm Ss"
    pub fn formatted_duration(&self) -> String {
        format!(
            "{}m {}s",
            self.duration_seconds / 60,
            self.duration_seconds % 60
        )
    }
}

/// Metrics block of the export document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportMetrics {
    #[serde(rename = "avgHRV")]
    pub avg_hrv: u32,
    #[serde(rename = "minHRV")]
    pub min_hrv: u32,
    #[serde(rename = "maxHRV")]
    pub max_hrv: u32,
    #[serde(rename = "hrvVariability")]
    pub hrv_variability: f64,
    #[serde(rename = "painScoreStart")]
    pub pain_score_start: u8,
    #[serde(rename = "painScoreEnd")]
    pub pain_score_end: u8,
    pub improvement: i32,
}

/// One track play interval inside a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicPlayedEntry {
    /// Track title
    pub track: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: u64,
}

/// Full session export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub session_id: String,
    pub patient_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub metrics: ExportMetrics,
    pub hrv_readings: Vec<Reading>,
    pub pain_score_updates: Vec<PainScoreEntry>,
    pub music_played: Vec<MusicPlayedEntry>,
}

impl SessionExport {
    /// Suggested download file name
    pub fn file_name(&self) -> String {
        format!("session-{}.json", self.session_id)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
