//! Patient domain model

use super::ids::{OrganizationId, PatientId, StudyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Participation status of a patient at a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    #[default]
    Screening,
    Active,
    Completed,
    Withdrawn,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Female,
    Male,
    Other,
    Unknown,
}

/// A pseudonymized patient record
///
/// Only the site-assigned code and coarse demographics are stored; direct
/// identifiers stay in the site's own systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub organization_id: OrganizationId,
    /// Site-assigned screening code, unique within the organization
    pub patient_code: String,
    #[serde(default)]
    pub initials: Option<String>,
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub status: PatientStatus,
    #[serde(default)]
    pub enrolled_study_ids: Vec<StudyId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    /// Creates a patient in screening status
    ///
    /// # Errors
    ///
    /// Returns an error if the patient code is empty
    pub fn new(
        organization_id: OrganizationId,
        patient_code: impl Into<String>,
    ) -> Result<Self, String> {
        let patient_code = patient_code.into().trim().to_string();
        if patient_code.is_empty() {
            return Err("patient_code cannot be empty".to_string());
        }
        let now = Utc::now();
        Ok(Self {
            id: PatientId::generate(),
            organization_id,
            patient_code,
            initials: None,
            birth_year: None,
            sex: None,
            status: PatientStatus::Screening,
            enrolled_study_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_enrolled_in(&self, study_id: &StudyId) -> bool {
        self.enrolled_study_ids.contains(study_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let org = OrganizationId::new("org-1").unwrap();
        let patient = Patient::new(org.clone(), " SCR-001 ").unwrap();
        assert_eq!(patient.patient_code, "SCR-001");
        assert_eq!(patient.status, PatientStatus::Screening);
        assert_eq!(patient.organization_id, org);
    }

    #[test]
    fn test_empty_code() {
        let org = OrganizationId::new("org-1").unwrap();
        assert!(Patient::new(org, "").is_err());
    }
}
