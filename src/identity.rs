//! Patient identity
//!
//! The engine only needs to know who the active patient is. Credentials and
//! clinical details never reach it: [`PatientIdentity`] has no field for them.

use serde::{Deserialize, Serialize};

/// Display-safe patient identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentity {
    pub patient_id: String,
    pub name: String,
    pub age: u32,
}

impl PatientIdentity {
    pub fn new(patient_id: impl Into<String>, name: impl Into<String>, age: u32) -> Self {
        Self {
            patient_id: patient_id.into(),
            name: name.into(),
            age,
        }
    }

    /// Restore an identity saved by the UI layer.
    ///
    /// Malformed or incomplete data yields `None`; the caller treats that as
    /// nobody being signed in.
    pub fn restore(json: &str) -> Option<Self> {
        let identity: Self = serde_json::from_str(json).ok()?;
        if identity.patient_id.trim().is_empty() || identity.name.trim().is_empty() {
            return None;
        }
        Some(identity)
    }
}

/// Source of the signed-in patient
pub trait IdentityProvider {
    /// The active patient, if anyone is signed in
    fn current_patient(&self) -> Option<PatientIdentity>;
}

/// Identity provider with a fixed answer
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    patient: Option<PatientIdentity>,
}

impl StaticIdentity {
    pub fn signed_in(patient: PatientIdentity) -> Self {
        Self {
            patient: Some(patient),
        }
    }

    pub fn anonymous() -> Self {
        Self { patient: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_patient(&self) -> Option<PatientIdentity> {
        self.patient
            .clone()
            .filter(|p| !p.patient_id.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_valid() {
        let identity =
            PatientIdentity::restore(r#"{"patientId": "PT001", "name": "Rajesh Kumar", "age": 45}"#)
                .unwrap();
        assert_eq!(identity, PatientIdentity::new("PT001", "Rajesh Kumar", 45));
    }

    #[test]
    fn test_restore_discards_malformed() {
        assert!(PatientIdentity::restore("{not json").is_none());
        assert!(PatientIdentity::restore(r#"{"patientId": "PT001"}"#).is_none());
        assert!(PatientIdentity::restore(r#"{"patientId": "", "name": "X", "age": 1}"#).is_none());
        let blank_name = r#"{"patientId": "PT1", "name": " ", "age": 1}"#;
        assert!(PatientIdentity::restore(blank_name).is_none());
    }

    #[test]
    fn test_restore_ignores_extra_fields() {
        let json = r#"{"patientId": "PT002", "name": "Priya Sharma", "age": 52, "pin": "5678"}"#;
        let identity = PatientIdentity::restore(json).unwrap();
        let round_trip = serde_json::to_string(&identity).unwrap();
        assert!(!round_trip.contains("pin"));
    }

    #[test]
    fn test_static_identity() {
        let provider = StaticIdentity::signed_in(PatientIdentity::new("PT003", "Amit Patel", 48));
        assert_eq!(provider.current_patient().unwrap().patient_id, "PT003");

        assert!(StaticIdentity::anonymous().current_patient().is_none());
        let blank = StaticIdentity::signed_in(PatientIdentity::new("  ", "Nobody", 0));
        assert!(blank.current_patient().is_none());
    }
}
