//! Enrollment and follow-up progress of one study

use crate::core::scheduling::{
    completion_percentage, DeviationKind, DeviationSeverity, ProtocolDeviation,
};
use crate::domain::{ClinicalStudy, StudyId, StudyStatus, Survey, SurveyStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SurveyCounts {
    pub active: usize,
    pub completed: usize,
    pub withdrawn: usize,
}

impl SurveyCounts {
    pub fn total(&self) -> usize {
        self.active + self.completed + self.withdrawn
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyProgressReport {
    pub study_id: StudyId,
    pub study_code: String,
    pub title: String,
    pub status: StudyStatus,
    pub generated_at: DateTime<Utc>,
    pub target_enrollment: u32,
    pub current_enrollment: u32,
    /// Enrollment against target, 0 when the study has no target
    pub enrollment_percentage: u8,
    pub surveys: SurveyCounts,
    /// Mean completion percentage over all surveys
    pub average_completion: f64,
    pub deviations_by_kind: BTreeMap<DeviationKind, usize>,
    pub deviations_by_severity: BTreeMap<DeviationSeverity, usize>,
    pub total_deviations: usize,
}

impl StudyProgressReport {
    pub fn build(
        study: &ClinicalStudy,
        surveys: &[Survey],
        deviations: &[ProtocolDeviation],
    ) -> Self {
        let mut counts = SurveyCounts::default();
        let mut completion_sum = 0u64;
        for survey in surveys {
            match survey.status {
                SurveyStatus::Active => counts.active += 1,
                SurveyStatus::Completed => counts.completed += 1,
                SurveyStatus::Withdrawn => counts.withdrawn += 1,
            }
            completion_sum += u64::from(survey.completion_percentage);
        }
        let average_completion = if surveys.is_empty() {
            0.0
        } else {
            completion_sum as f64 / surveys.len() as f64
        };

        let mut deviations_by_kind = BTreeMap::new();
        let mut deviations_by_severity = BTreeMap::new();
        for deviation in deviations {
            *deviations_by_kind.entry(deviation.kind).or_default() += 1;
            *deviations_by_severity.entry(deviation.severity).or_default() += 1;
        }

        Self {
            study_id: study.id.clone(),
            study_code: study.code.clone(),
            title: study.title.clone(),
            status: study.status,
            generated_at: Utc::now(),
            target_enrollment: study.target_enrollment,
            current_enrollment: study.current_enrollment,
            enrollment_percentage: completion_percentage(
                study.current_enrollment,
                study.target_enrollment,
            ),
            surveys: counts,
            average_completion,
            deviations_by_kind,
            deviations_by_severity,
            total_deviations: deviations.len(),
        }
    }

    pub fn major_deviations(&self) -> usize {
        self.deviations_by_severity
            .get(&DeviationSeverity::Major)
            .copied()
            .unwrap_or(0)
    }

    pub fn format_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Study {}: {}", self.study_code, self.title);
        let _ = writeln!(out, "Status: {:?}", self.status);
        if self.target_enrollment > 0 {
            let _ = writeln!(
                out,
                "Enrollment: {} of {} ({}%)",
                self.current_enrollment, self.target_enrollment, self.enrollment_percentage
            );
        } else {
            let _ = writeln!(out, "Enrollment: {} (no target)", self.current_enrollment);
        }
        let _ = writeln!(
            out,
            "Surveys: {} active, {} completed, {} withdrawn",
            self.surveys.active, self.surveys.completed, self.surveys.withdrawn
        );
        let _ = writeln!(out, "Average completion: {:.1}%", self.average_completion);
        let _ = writeln!(
            out,
            "Deviations: {} ({} major)",
            self.total_deviations,
            self.major_deviations()
        );
        for (kind, count) in &self.deviations_by_kind {
            let _ = writeln!(out, "  {:<20} {count}", kind.to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrganizationId, PatientId, SurveyId, VisitId, VisitTemplate};
    use chrono::NaiveDate;

    fn study() -> ClinicalStudy {
        let mut study = ClinicalStudy::new(
            "ONC",
            "Oncology",
            "1.0",
            vec![VisitTemplate::new(1, "Baseline", 0)],
        )
        .unwrap();
        study.target_enrollment = 8;
        study.current_enrollment = 3;
        study
    }

    fn survey(status: SurveyStatus, pct: u8) -> Survey {
        let mut survey = Survey::new(
            PatientId::generate(),
            StudyId::new("s").unwrap(),
            OrganizationId::new("o").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );
        survey.status = status;
        survey.completion_percentage = pct;
        survey
    }

    fn deviation(kind: DeviationKind, severity: DeviationSeverity) -> ProtocolDeviation {
        ProtocolDeviation {
            visit_id: VisitId::generate(),
            survey_id: SurveyId::generate(),
            visit_number: 1,
            kind,
            severity,
            days_outside: 0,
            examination_code: None,
            description: String::new(),
        }
    }

    #[test]
    fn test_build_aggregates() {
        let surveys = vec![
            survey(SurveyStatus::Active, 50),
            survey(SurveyStatus::Completed, 100),
            survey(SurveyStatus::Withdrawn, 0),
        ];
        let deviations = vec![
            deviation(DeviationKind::OverdueVisit, DeviationSeverity::Major),
            deviation(DeviationKind::OverdueVisit, DeviationSeverity::Major),
            deviation(DeviationKind::TimingDeviation, DeviationSeverity::Minor),
        ];
        let report = StudyProgressReport::build(&study(), &surveys, &deviations);

        // 3 of 8 rounds to 38
        assert_eq!(report.enrollment_percentage, 38);
        assert_eq!(report.surveys.total(), 3);
        assert_eq!(report.surveys.withdrawn, 1);
        assert!((report.average_completion - 50.0).abs() < f64::EPSILON);
        assert_eq!(report.deviations_by_kind[&DeviationKind::OverdueVisit], 2);
        assert_eq!(report.major_deviations(), 2);
        assert!(report.format_summary().contains("Enrollment: 3 of 8 (38%)"));
    }

    #[test]
    fn test_empty_study() {
        let mut study = study();
        study.target_enrollment = 0;
        let report = StudyProgressReport::build(&study, &[], &[]);
        assert_eq!(report.enrollment_percentage, 0);
        assert_eq!(report.average_completion, 0.0);
        assert_eq!(report.total_deviations, 0);
    }
}
