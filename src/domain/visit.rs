//! Visit domain model
//!
//! A visit is a scheduled clinical encounter with a protocol window and an
//! examination checklist. Status changes are not validated here: the
//! visit service applies whatever state the caller supplies.

use super::ids::{OrganizationId, PatientId, StudyId, SurveyId, VisitId};
use super::study::ExaminationStep;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Missed,
    Cancelled,
    Rescheduled,
}

impl VisitStatus {
    /// Completed, missed and cancelled visits need no further action
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            VisitStatus::Completed | VisitStatus::Missed | VisitStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::InProgress => "in_progress",
            VisitStatus::Completed => "completed",
            VisitStatus::Missed => "missed",
            VisitStatus::Cancelled => "cancelled",
            VisitStatus::Rescheduled => "rescheduled",
        }
    }
}

impl std::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A required or optional examination that was not performed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedExamination {
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub survey_id: SurveyId,
    pub patient_id: PatientId,
    pub study_id: StudyId,
    pub organization_id: OrganizationId,
    pub visit_number: u32,
    pub name: String,
    pub scheduled_date: NaiveDate,
    /// First day of the protocol window (inclusive)
    pub window_start: NaiveDate,
    /// Last day of the protocol window (inclusive)
    pub window_end: NaiveDate,
    #[serde(default)]
    pub actual_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: VisitStatus,
    #[serde(default)]
    pub required_examinations: Vec<ExaminationStep>,
    #[serde(default)]
    pub optional_examinations: Vec<ExaminationStep>,
    /// Codes of examinations performed
    #[serde(default)]
    pub completed_examinations: Vec<String>,
    #[serde(default)]
    pub skipped_examinations: Vec<SkippedExamination>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// Whether the examination code belongs to this visit's checklist
    pub fn has_examination(&self, code: &str) -> bool {
        self.required_examinations
            .iter()
            .chain(self.optional_examinations.iter())
            .any(|step| step.code == code)
    }

    pub fn is_examination_completed(&self, code: &str) -> bool {
        self.completed_examinations.iter().any(|c| c == code)
    }

    pub fn is_examination_skipped(&self, code: &str) -> bool {
        self.skipped_examinations.iter().any(|s| s.code == code)
    }

    /// Required examinations neither performed nor skipped
    pub fn outstanding_required(&self) -> Vec<&ExaminationStep> {
        self.required_examinations
            .iter()
            .filter(|step| {
                !self.is_examination_completed(&step.code)
                    && !self.is_examination_skipped(&step.code)
            })
            .collect()
    }

    /// Completed share of the required checklist, 0-100
    pub fn checklist_percentage(&self) -> u8 {
        let total = self.required_examinations.len();
        let done = self
            .required_examinations
            .iter()
            .filter(|step| self.is_examination_completed(&step.code))
            .count();
        crate::core::scheduling::progress::completion_percentage(done as u32, total as u32)
    }
}
