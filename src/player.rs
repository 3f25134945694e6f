//! Simulated music player
//!
//! Holds the transport state the patient controls (play, pause, skip,
//! volume) and reacts to new readings by refreshing the queue and, while
//! playing, letting the selector adapt the current track.

use crate::catalog::TrackCatalog;
use crate::selector::{TrackSelector, QUEUE_LENGTH};
use crate::types::{AdaptationEvent, Reading, Track};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serializable view of the player for the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub elapsed_seconds: u64,
    /// 0-100
    pub progress: f64,
    /// 0-100
    pub volume: u8,
    pub queue: Vec<Track>,
    pub last_adaptation: Option<AdaptationEvent>,
    pub show_adaptation_alert: bool,
}

#[derive(Debug, Clone)]
pub struct Player {
    current: Option<Track>,
    playing: bool,
    elapsed_seconds: u64,
    volume: u8,
    queue: Vec<Track>,
    last_adaptation: Option<AdaptationEvent>,
    adaptation_alert: bool,
}

impl Player {
    /// Start paused on the first catalog track with the next ones queued
    pub fn new(catalog: &TrackCatalog, volume: u8) -> Self {
        let tracks = catalog.tracks();
        Self {
            current: tracks.first().cloned(),
            playing: false,
            elapsed_seconds: 0,
            volume: volume.min(100),
            queue: tracks.iter().skip(1).take(QUEUE_LENGTH).cloned().collect(),
            last_adaptation: None,
            adaptation_alert: false,
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Position in the current track as a percentage
    pub fn progress(&self) -> f64 {
        match &self.current {
            Some(track) if track.duration_seconds > 0 => {
                let pct = self.elapsed_seconds as f64 / f64::from(track.duration_seconds) * 100.0;
                pct.min(100.0)
            }
            _ => 0.0,
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    pub fn last_adaptation(&self) -> Option<&AdaptationEvent> {
        self.last_adaptation.as_ref()
    }

    pub fn is_adaptation_alert_visible(&self) -> bool {
        self.adaptation_alert
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Set volume, clamped to 0-100
    pub fn set_volume(&mut self, volume: i32) {
        self.volume = volume.clamp(0, 100) as u8;
    }

    /// Move to the head of the queue. Returns false when the queue is empty.
    pub fn skip_next(&mut self) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        let next = self.queue.remove(0);
        self.load(next);
        true
    }

    /// Restart the current track
    pub fn skip_previous(&mut self) {
        self.elapsed_seconds = 0;
    }

    /// Switch to a track picked by the patient
    pub fn select_track(&mut self, track: Track) {
        self.queue.retain(|t| t.id != track.id);
        self.load(track);
    }

    pub fn dismiss_adaptation_alert(&mut self) {
        self.adaptation_alert = false;
    }

    /// Advance playback by `seconds`. At the end of a track the player moves
    /// to the queue head, or restarts the track when the queue is empty.
    /// Returns true when the current track changed.
    pub fn advance(&mut self, seconds: u64) -> bool {
        let duration = match (&self.current, self.playing) {
            (Some(track), true) => u64::from(track.duration_seconds),
            _ => return false,
        };

        self.elapsed_seconds += seconds;
        if self.elapsed_seconds < duration {
            return false;
        }

        if self.skip_next() {
            true
        } else {
            self.elapsed_seconds = 0;
            false
        }
    }

    /// React to a new reading: adapt the track while playing, then refresh
    /// the queue around whatever is now current
    pub fn apply_reading(
        &mut self,
        selector: &TrackSelector,
        reading: &Reading,
        at: DateTime<Utc>,
    ) -> Option<AdaptationEvent> {
        let mut adapted = None;

        if self.playing {
            let selection = selector.select(reading.value, reading.zone, self.current.as_ref(), at);
            if let Some(event) = selection.adaptation {
                self.load(selection.track);
                self.last_adaptation = Some(event.clone());
                self.adaptation_alert = true;
                adapted = Some(event);
            }
        }

        self.queue = selector.recommend(reading.value, self.current.as_ref());
        adapted
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            current_track: self.current.clone(),
            is_playing: self.playing,
            elapsed_seconds: self.elapsed_seconds,
            progress: self.progress(),
            volume: self.volume,
            queue: self.queue.clone(),
            last_adaptation: self.last_adaptation.clone(),
            show_adaptation_alert: self.adaptation_alert,
        }
    }

    fn load(&mut self, track: Track) {
        self.current = Some(track);
        self.elapsed_seconds = 0;
    }
}
