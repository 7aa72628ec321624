//! Survey domain model
//!
//! A survey is one patient's enrollment in one study: the container for the
//! patient's visit schedule and its progress counters.

use super::ids::{OrganizationId, PatientId, StudyId, SurveyId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Enrollment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    #[default]
    Active,
    Completed,
    Withdrawn,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::Active => "active",
            SurveyStatus::Completed => "completed",
            SurveyStatus::Withdrawn => "withdrawn",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub patient_id: PatientId,
    pub study_id: StudyId,
    pub organization_id: OrganizationId,
    pub baseline_date: NaiveDate,
    pub expected_completion_date: NaiveDate,
    pub total_visits: u32,
    #[serde(default)]
    pub completed_visits: u32,
    #[serde(default)]
    pub missed_visits: u32,
    /// Rounded share of completed visits, 0-100
    #[serde(default)]
    pub completion_percentage: u8,
    #[serde(default)]
    pub status: SurveyStatus,
    #[serde(default)]
    pub withdrawal_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Survey {
    /// Creates an active survey with empty progress
    pub fn new(
        patient_id: PatientId,
        study_id: StudyId,
        organization_id: OrganizationId,
        baseline_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SurveyId::generate(),
            patient_id,
            study_id,
            organization_id,
            baseline_date,
            expected_completion_date: baseline_date,
            total_visits: 0,
            completed_visits: 0,
            missed_visits: 0,
            completion_percentage: 0,
            status: SurveyStatus::Active,
            withdrawal_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SurveyStatus::Active
    }
}
