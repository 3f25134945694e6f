//! Session history store
//!
//! Completed sessions live for the lifetime of the process only. The store
//! sits behind a trait so a host application can route records to its own
//! backend.

use crate::error::EngineError;
use crate::types::SessionRecord;

/// Persistence collaborator for finished sessions
pub trait SessionStore {
    /// Record a finished session
    fn add_session(&mut self, record: SessionRecord);

    /// A patient's sessions, newest start time first
    fn sessions_for_patient(&self, patient_id: &str) -> Vec<SessionRecord>;

    fn session_by_id(&self, session_id: &str) -> Option<SessionRecord>;
}

/// Process-lifetime session store
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    /// Most recent insert first
    sessions: Vec<SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from a JSON array of records (e.g. earlier history)
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let sessions: Vec<SessionRecord> = serde_json::from_str(json)?;
        Ok(Self { sessions })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.sessions)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn add_session(&mut self, record: SessionRecord) {
        self.sessions.insert(0, record);
    }

    fn sessions_for_patient(&self, patient_id: &str) -> Vec<SessionRecord> {
        let mut sessions: Vec<SessionRecord> = self
            .sessions
            .iter()
            .filter(|s| s.patient_id == patient_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order (newest first) for equal start times
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        sessions
    }

    fn session_by_id(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned()
    }
}
