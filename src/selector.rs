//! Adaptive track selection
//!
//! Decides on every reading whether the playing track still suits the
//! patient's state, picks a replacement when it does not, and builds the
//! up-next queue.

use crate::catalog::TrackCatalog;
use crate::types::{AdaptationEvent, Track, Zone};
use chrono::{DateTime, Utc};

/// Maximum length of the recommended queue
pub const QUEUE_LENGTH: usize = 3;

/// Below this many close matches the queue is padded from the catalog
const MIN_CLOSE_MATCHES: usize = 2;

/// Range widening used when looking for queue candidates
const QUEUE_MARGIN: u32 = 10;

/// Outcome of a selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Track that should be playing
    pub track: Track,
    /// Present only when `track` differs from what was playing
    pub adaptation: Option<AdaptationEvent>,
}

/// Track selector over a fixed catalog
#[derive(Debug, Clone, Default)]
pub struct TrackSelector {
    catalog: TrackCatalog,
}

impl TrackSelector {
    pub fn new(catalog: TrackCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    /// Choose the track for the current reading.
    ///
    /// Keeps `current` whenever its range contains `value`; otherwise picks
    /// the first suited track in catalog order, falling back to a tempo rule
    /// for the zone when nothing suits.
    pub fn select(
        &self,
        value: u32,
        zone: Zone,
        current: Option<&Track>,
        at: DateTime<Utc>,
    ) -> Selection {
        if let Some(current) = current {
            if self.catalog.suited_to(value).any(|t| t.id == current.id) {
                return Selection {
                    track: current.clone(),
                    adaptation: None,
                };
            }
        }

        let chosen = match self.catalog.suited_to(value).next() {
            Some(first) => first.clone(),
            None => self.fallback_for(zone).clone(),
        };

        let adaptation = AdaptationEvent {
            reason: adaptation_reason(zone, &chosen),
            from_track: current.cloned(),
            to_track: chosen.clone(),
            timestamp: at,
        };

        Selection {
            track: chosen,
            adaptation: Some(adaptation),
        }
    }

    /// Best track for a zone when no range matches
    fn fallback_for(&self, zone: Zone) -> &Track {
        let found = match zone {
            Zone::Low => self.catalog.calming().next(),
            Zone::High => self.catalog.uplifting().next(),
            Zone::Normal => self.catalog.steady().next(),
        };
        found.unwrap_or_else(|| self.catalog.first())
    }

    /// Up to three tracks to play next, excluding `current`
    pub fn recommend(&self, value: u32, current: Option<&Track>) -> Vec<Track> {
        let is_current = |t: &Track| current.is_some_and(|c| c.id == t.id);

        let mut queue: Vec<Track> = self
            .catalog
            .tracks()
            .iter()
            .filter(|t| !is_current(t) && t.suits_within(value, QUEUE_MARGIN))
            .take(QUEUE_LENGTH)
            .cloned()
            .collect();

        if queue.len() < MIN_CLOSE_MATCHES {
            let padding: Vec<Track> = self
                .catalog
                .tracks()
                .iter()
                .filter(|t| !is_current(t) && !queue.iter().any(|q| q.id == t.id))
                .take(QUEUE_LENGTH - queue.len())
                .cloned()
                .collect();
            queue.extend(padding);
        }

        queue
    }
}

/// Why a track appears in the queue
pub fn recommendation_reason(track: &Track, value: u32) -> &'static str {
    let (min, _) = track.valid_range;
    if track.suits(value) {
        "Matches your current state"
    } else if value < min {
        "Helps with relaxation"
    } else {
        "Next in therapy sequence"
    }
}

/// Patient-facing explanation for a switch; supportive, never alarming
fn adaptation_reason(zone: Zone, track: &Track) -> String {
    match zone {
        Zone::Low => format!(
            "We've noticed some stress signals. Switching to \"{}\" to help you relax.",
            track.title
        ),
        Zone::High => format!(
            "Your relaxation is deepening. Playing \"{}\" to continue your progress.",
            track.title
        ),
        Zone::Normal => format!(
            "Your body is responding well. Continuing with \"{}\".",
            track.title
        ),
    }
}
