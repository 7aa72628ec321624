//! Clinical study domain model
//!
//! A study carries its protocol: an ordered list of visit templates, each
//! with a day offset from the patient's baseline, a tolerance window and
//! the examinations to perform. Enrollment counters live on the study.

use super::errors::TrialError;
use super::ids::{OrganizationId, StudyId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Trial phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StudyPhase {
    Phase1,
    Phase2,
    Phase3,
    Phase4,
    #[default]
    NotApplicable,
}

/// Lifecycle status of a study
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StudyStatus {
    #[default]
    Draft,
    Active,
    Suspended,
    Completed,
    Terminated,
}

/// One examination step of a visit (lab draw, ECG, questionnaire, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExaminationStep {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub order: u32,
}

impl ExaminationStep {
    pub fn new(code: impl Into<String>, name: impl Into<String>, order: u32) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            order,
        }
    }
}

/// Protocol definition of one visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitTemplate {
    pub visit_number: u32,
    pub name: String,
    /// Days after the baseline date the visit is due
    pub day_offset: i64,
    /// Days the visit may happen before its due date
    #[serde(default)]
    pub window_before_days: i64,
    /// Days the visit may happen after its due date
    #[serde(default)]
    pub window_after_days: i64,
    #[serde(default)]
    pub required_examinations: Vec<ExaminationStep>,
    #[serde(default)]
    pub optional_examinations: Vec<ExaminationStep>,
}

impl VisitTemplate {
    pub fn new(visit_number: u32, name: impl Into<String>, day_offset: i64) -> Self {
        Self {
            visit_number,
            name: name.into(),
            day_offset,
            window_before_days: 0,
            window_after_days: 0,
            required_examinations: Vec::new(),
            optional_examinations: Vec::new(),
        }
    }

    pub fn with_window(mut self, before_days: i64, after_days: i64) -> Self {
        self.window_before_days = before_days;
        self.window_after_days = after_days;
        self
    }

    pub fn with_required(mut self, step: ExaminationStep) -> Self {
        self.required_examinations.push(step);
        self
    }

    pub fn with_optional(mut self, step: ExaminationStep) -> Self {
        self.optional_examinations.push(step);
        self
    }
}

/// Longest protocol a template may describe, in days from baseline (25 years)
pub const MAX_PROTOCOL_DAYS: i64 = 25 * 366;

/// Validates an ordered list of visit templates
///
/// # Errors
///
/// Returns a description of the first rule the schedule breaks
pub fn validate_visit_templates(templates: &[VisitTemplate]) -> Result<(), String> {
    if templates.is_empty() {
        return Err("a study needs at least one visit template".to_string());
    }

    for (index, template) in templates.iter().enumerate() {
        if template.name.trim().is_empty() {
            return Err(format!("visit {} has an empty name", template.visit_number));
        }
        if template.window_before_days < 0 || template.window_after_days < 0 {
            return Err(format!(
                "visit {} has a negative window",
                template.visit_number
            ));
        }
        if template.day_offset.abs() > MAX_PROTOCOL_DAYS {
            return Err(format!(
                "visit {} is {} days from baseline, the limit is {MAX_PROTOCOL_DAYS}",
                template.visit_number, template.day_offset
            ));
        }
        if template.window_before_days > MAX_PROTOCOL_DAYS
            || template.window_after_days > MAX_PROTOCOL_DAYS
        {
            return Err(format!(
                "visit {} has a window longer than {MAX_PROTOCOL_DAYS} days",
                template.visit_number
            ));
        }

        if index > 0 {
            let previous = &templates[index - 1];
            if template.visit_number <= previous.visit_number {
                return Err(format!(
                    "visit numbers must be strictly increasing ({} follows {})",
                    template.visit_number, previous.visit_number
                ));
            }
            if template.day_offset < previous.day_offset {
                return Err(format!(
                    "visit {} is due before visit {}",
                    template.visit_number, previous.visit_number
                ));
            }
        }

        let mut codes = HashSet::new();
        for step in template
            .required_examinations
            .iter()
            .chain(template.optional_examinations.iter())
        {
            if !codes.insert(step.code.as_str()) {
                return Err(format!(
                    "examination '{}' appears twice in visit {}",
                    step.code, template.visit_number
                ));
            }
        }
    }

    Ok(())
}

/// A clinical study protocol and its enrollment bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalStudy {
    pub id: StudyId,
    /// Unique protocol code (e.g. "ONC-2024-01")
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub protocol_version: String,
    #[serde(default)]
    pub phase: StudyPhase,
    #[serde(default)]
    pub status: StudyStatus,
    #[serde(default)]
    pub target_organization_ids: Vec<OrganizationId>,
    pub visit_templates: Vec<VisitTemplate>,
    /// Enrollment cap across all sites (0 = unlimited)
    #[serde(default)]
    pub target_enrollment: u32,
    #[serde(default)]
    pub current_enrollment: u32,
    #[serde(default)]
    pub completed_count: u32,
    #[serde(default)]
    pub withdrawn_count: u32,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClinicalStudy {
    /// Creates a new draft study
    ///
    /// # Errors
    ///
    /// Returns an error if the code or title is empty or the visit templates
    /// are inconsistent
    pub fn new(
        code: impl Into<String>,
        title: impl Into<String>,
        protocol_version: impl Into<String>,
        visit_templates: Vec<VisitTemplate>,
    ) -> Result<Self, String> {
        let code = code.into().trim().to_uppercase();
        let title = title.into();
        if code.is_empty() {
            return Err("study code cannot be empty".to_string());
        }
        if title.trim().is_empty() {
            return Err("study title cannot be empty".to_string());
        }
        validate_visit_templates(&visit_templates)?;
        let now = Utc::now();

        Ok(Self {
            id: StudyId::generate(),
            code,
            title,
            description: None,
            protocol_version: protocol_version.into(),
            phase: StudyPhase::default(),
            status: StudyStatus::Draft,
            target_organization_ids: Vec::new(),
            visit_templates,
            target_enrollment: 0,
            current_enrollment: 0,
            completed_count: 0,
            withdrawn_count: 0,
            start_date: None,
            end_date: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the study targets the given site
    pub fn targets(&self, organization_id: &OrganizationId) -> bool {
        self.target_organization_ids.contains(organization_id)
    }

    /// Number of patients currently on study (enrolled minus finished)
    pub fn active_enrollment(&self) -> u32 {
        self.current_enrollment
            .saturating_sub(self.completed_count)
            .saturating_sub(self.withdrawn_count)
    }

    /// Whether the enrollment cap has been reached
    pub fn is_full(&self) -> bool {
        self.target_enrollment > 0 && self.current_enrollment >= self.target_enrollment
    }

    /// Counts a new enrollment
    ///
    /// # Errors
    ///
    /// Returns [`TrialError::EnrollmentClosed`] when the study is not active or full
    pub fn enroll(&mut self) -> Result<(), TrialError> {
        if self.status != StudyStatus::Active {
            return Err(TrialError::EnrollmentClosed(format!(
                "study {} is {:?}",
                self.code, self.status
            )));
        }
        if self.is_full() {
            return Err(TrialError::EnrollmentClosed(format!(
                "study {} reached its target enrollment of {}",
                self.code, self.target_enrollment
            )));
        }
        self.current_enrollment += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_completion(&mut self) {
        self.completed_count += 1;
        self.updated_at = Utc::now();
    }

    pub fn record_withdrawal(&mut self) {
        self.withdrawn_count += 1;
        self.updated_at = Utc::now();
    }
}
