//! Track catalog
//!
//! An ordered, immutable list of therapy tracks fixed at startup. Catalog
//! order is meaningful: it is the tie-break for every selection rule.

use crate::error::EngineError;
use crate::types::Track;

/// Ordered set of therapy tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackCatalog {
    tracks: Vec<Track>,
}

impl Default for TrackCatalog {
    fn default() -> Self {
        Self {
            tracks: default_tracks(),
        }
    }
}

impl TrackCatalog {
    /// Build a catalog, rejecting empty lists, duplicate ids and inverted ranges
    pub fn new(tracks: Vec<Track>) -> Result<Self, EngineError> {
        if tracks.is_empty() {
            return Err(EngineError::InvalidCatalog(
                "catalog must contain at least one track".to_string(),
            ));
        }
        for (i, track) in tracks.iter().enumerate() {
            let (min, max) = track.valid_range;
            if min > max {
                return Err(EngineError::InvalidCatalog(format!(
                    "track {} has inverted range [{min}, {max}]",
                    track.id
                )));
            }
            if track.duration_seconds == 0 {
                return Err(EngineError::InvalidCatalog(format!(
                    "track {} has zero duration",
                    track.id
                )));
            }
            if tracks[..i].iter().any(|t| t.id == track.id) {
                return Err(EngineError::InvalidCatalog(format!(
                    "duplicate track id {}",
                    track.id
                )));
            }
        }
        Ok(Self { tracks })
    }

    /// Load a catalog from a JSON array of tracks
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let tracks: Vec<Track> = serde_json::from_str(json)?;
        Self::new(tracks)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.tracks)
    }

    /// All tracks in catalog order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// First track; catalogs are never empty
    pub fn first(&self) -> &Track {
        &self.tracks[0]
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Tracks whose valid range contains `value`, in catalog order
    pub fn suited_to(&self, value: u32) -> impl Iterator<Item = &Track> + '_ {
        self.tracks.iter().filter(move |t| t.suits(value))
    }

    /// Slow tracks (< 60 BPM) for stressed patients
    pub fn calming(&self) -> impl Iterator<Item = &Track> + '_ {
        self.tracks.iter().filter(|t| t.tempo < 60)
    }

    /// Moderate tracks (60-80 BPM) for relaxed patients
    pub fn uplifting(&self) -> impl Iterator<Item = &Track> + '_ {
        self.tracks.iter().filter(|t| (60..=80).contains(&t.tempo))
    }

    /// Resting-pace tracks (55-65 BPM) for patients in the normal zone
    pub fn steady(&self) -> impl Iterator<Item = &Track> + '_ {
        self.tracks.iter().filter(|t| (55..=65).contains(&t.tempo))
    }
}

/// Static description of a built-in track
struct BuiltinTrack {
    id: &'static str,
    title: &'static str,
    therapy_goal: &'static str,
    tempo: u32,
    key: &'static str,
    mood: &'static str,
    duration_seconds: u32,
    valid_range: (u32, u32),
}

impl BuiltinTrack {
    fn to_track(&self) -> Track {
        Track {
            id: self.id.to_string(),
            title: self.title.to_string(),
            therapy_goal: self.therapy_goal.to_string(),
            tempo: self.tempo,
            key: self.key.to_string(),
            mood: self.mood.to_string(),
            duration_seconds: self.duration_seconds,
            valid_range: self.valid_range,
        }
    }
}

const DEFAULT_TRACKS: [BuiltinTrack; 5] = [
    BuiltinTrack {
        id: "track_001",
        title: "Gentle Waves",
        therapy_goal: "Pain Relief",
        tempo: 58,
        key: "C Major",
        mood: "Calming",
        duration_seconds: 300,
        valid_range: (20, 45),
    },
    BuiltinTrack {
        id: "track_002",
        title: "Breathing Space",
        therapy_goal: "Anxiety Reduction",
        tempo: 62,
        key: "G Major",
        mood: "Grounding",
        duration_seconds: 240,
        valid_range: (25, 50),
    },
    BuiltinTrack {
        id: "track_003",
        title: "Uplift",
        therapy_goal: "Mood Enhancement",
        tempo: 75,
        key: "D Major",
        mood: "Uplifting",
        duration_seconds: 300,
        valid_range: (45, 80),
    },
    BuiltinTrack {
        id: "track_004",
        title: "Deep Rest",
        therapy_goal: "Sleep Support",
        tempo: 52,
        key: "A Minor",
        mood: "Meditative",
        duration_seconds: 600,
        valid_range: (30, 60),
    },
    BuiltinTrack {
        id: "track_005",
        title: "Heartbeat Echo",
        therapy_goal: "Grounding",
        tempo: 65,
        key: "E Minor",
        mood: "Stabilizing",
        duration_seconds: 360,
        valid_range: (35, 65),
    },
];

/// Built-in therapy catalog
fn default_tracks() -> Vec<Track> {
    DEFAULT_TRACKS.iter().map(BuiltinTrack::to_track).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = TrackCatalog::default();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.first().title, "Gentle Waves");
        assert_eq!(catalog.get("track_004").unwrap().title, "Deep Rest");
        assert!(catalog.get("track_999").is_none());
    }

    #[test]
    fn test_filters_keep_catalog_order() {
        let catalog = TrackCatalog::default();

        let suited: Vec<&str> = catalog.suited_to(45).map(|t| t.id.as_str()).collect();
        assert_eq!(
            suited,
            vec!["track_001", "track_002", "track_003", "track_004", "track_005"]
        );

        let calming: Vec<&str> = catalog.calming().map(|t| t.title.as_str()).collect();
        assert_eq!(calming, vec!["Gentle Waves", "Deep Rest"]);

        let uplifting: Vec<&str> = catalog.uplifting().map(|t| t.title.as_str()).collect();
        assert_eq!(uplifting, vec!["Breathing Space", "Uplift", "Heartbeat Echo"]);

        let steady: Vec<&str> = catalog.steady().map(|t| t.title.as_str()).collect();
        assert_eq!(steady, vec!["Gentle Waves", "Breathing Space", "Heartbeat Echo"]);
    }

    #[test]
    fn test_rejects_empty_catalog() {
        assert!(matches!(
            TrackCatalog::new(Vec::new()),
            Err(EngineError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_rejects_bad_tracks() {
        let mut tracks = default_tracks();
        tracks[1].valid_range = (50, 25);
        assert!(TrackCatalog::new(tracks).is_err());

        let mut tracks = default_tracks();
        tracks[2].id = "track_001".to_string();
        assert!(TrackCatalog::new(tracks).is_err());

        let mut tracks = default_tracks();
        tracks[0].duration_seconds = 0;
        assert!(TrackCatalog::new(tracks).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let catalog = TrackCatalog::default();
        let loaded = TrackCatalog::from_json(&catalog.to_json().unwrap()).unwrap();
        assert_eq!(catalog, loaded);
    }

    #[test]
    fn test_json_shape() {
        let json = r#"[{
            "id": "t1",
            "title": "Solo",
            "therapyGoal": "Grounding",
            "tempo": 60,
            "key": "F Major",
            "mood": "Warm",
            "durationSeconds": 120,
            "validRange": [30, 40]
        }]"#;
        let catalog = TrackCatalog::from_json(json).unwrap();
        assert_eq!(catalog.first().valid_range, (30, 40));
    }
}
