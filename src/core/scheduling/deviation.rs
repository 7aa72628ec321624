//! Protocol deviation detection
//!
//! Deviations are derived, never stored: running the detector twice over the
//! same visits yields the same list. Services log each finding to the audit
//! trail when a visit is completed.

use super::planner::visit_window;
use crate::config::SchedulingConfig;
use crate::domain::{Severity, SurveyId, Visit, VisitId, VisitStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationKind {
    /// Visit completed outside its window
    TimingDeviation,
    /// Open visit whose window has closed
    OverdueVisit,
    /// Visit marked missed
    MissedVisit,
    /// Required examination neither performed nor skipped
    MissedAssessment,
    /// Required examination skipped with a reason
    SkippedAssessment,
    /// Visit completed while an earlier visit is still open
    OutOfSequence,
}

impl DeviationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviationKind::TimingDeviation => "timing_deviation",
            DeviationKind::OverdueVisit => "overdue_visit",
            DeviationKind::MissedVisit => "missed_visit",
            DeviationKind::MissedAssessment => "missed_assessment",
            DeviationKind::SkippedAssessment => "skipped_assessment",
            DeviationKind::OutOfSequence => "out_of_sequence",
        }
    }
}

impl fmt::Display for DeviationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationSeverity {
    Minor,
    Major,
}

impl DeviationSeverity {
    /// Severity of the audit event recording the deviation
    pub fn audit_severity(&self) -> Severity {
        match self {
            DeviationSeverity::Minor => Severity::Medium,
            DeviationSeverity::Major => Severity::High,
        }
    }
}

/// A single finding against one visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDeviation {
    pub visit_id: VisitId,
    pub survey_id: SurveyId,
    pub visit_number: u32,
    pub kind: DeviationKind,
    pub severity: DeviationSeverity,
    /// Signed days outside the window (0 when not a timing finding)
    pub days_outside: i64,
    /// Examination concerned, for assessment findings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examination_code: Option<String>,
    pub description: String,
}

impl ProtocolDeviation {
    fn new(visit: &Visit, kind: DeviationKind, severity: DeviationSeverity) -> Self {
        Self {
            visit_id: visit.id.clone(),
            survey_id: visit.survey_id.clone(),
            visit_number: visit.visit_number,
            kind,
            severity,
            days_outside: 0,
            examination_code: None,
            description: String::new(),
        }
    }

    fn days(mut self, days: i64) -> Self {
        self.days_outside = days;
        self
    }

    fn examination(mut self, code: &str) -> Self {
        self.examination_code = Some(code.to_string());
        self
    }

    fn describe(mut self, description: String) -> Self {
        self.description = description;
        self
    }
}

/// Thresholds applied by [`detect_deviations`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviationPolicy {
    /// Timing deviations up to this many days are minor
    pub major_threshold_days: i64,
}

impl Default for DeviationPolicy {
    fn default() -> Self {
        Self {
            major_threshold_days: 7,
        }
    }
}

impl From<&SchedulingConfig> for DeviationPolicy {
    fn from(config: &SchedulingConfig) -> Self {
        Self {
            major_threshold_days: config.major_deviation_days,
        }
    }
}

impl DeviationPolicy {
    pub fn timing_severity(&self, days_outside: i64) -> DeviationSeverity {
        if days_outside.abs() <= self.major_threshold_days {
            DeviationSeverity::Minor
        } else {
            DeviationSeverity::Major
        }
    }
}

fn is_open(status: VisitStatus) -> bool {
    matches!(
        status,
        VisitStatus::Scheduled | VisitStatus::InProgress | VisitStatus::Rescheduled
    )
}

/// Scans one survey's visits for deviations as of `as_of`
///
/// Findings are returned in visit-number order.
pub fn detect_deviations(
    visits: &[Visit],
    as_of: NaiveDate,
    policy: &DeviationPolicy,
) -> Vec<ProtocolDeviation> {
    let mut ordered: Vec<&Visit> = visits.iter().collect();
    ordered.sort_by_key(|v| v.visit_number);

    let mut deviations = Vec::new();
    // Lowest-numbered visit seen so far that is still open
    let mut earliest_open: Option<u32> = None;

    for visit in ordered {
        let window = visit_window(visit);

        match visit.status {
            VisitStatus::Completed => {
                if let Some(actual) = visit.actual_date {
                    let days = window.deviation_days(actual);
                    if days != 0 {
                        let when = if days < 0 { "early" } else { "late" };
                        deviations.push(
                            ProtocolDeviation::new(
                                visit,
                                DeviationKind::TimingDeviation,
                                policy.timing_severity(days),
                            )
                            .days(days)
                            .describe(format!(
                                "Visit {} performed {} day(s) {when} (window {} to {})",
                                visit.visit_number,
                                days.abs(),
                                window.start,
                                window.end
                            )),
                        );
                    }
                }

                for step in &visit.required_examinations {
                    if visit.is_examination_completed(&step.code) {
                        continue;
                    }
                    if let Some(skip) = visit
                        .skipped_examinations
                        .iter()
                        .find(|s| s.code == step.code)
                    {
                        deviations.push(
                            ProtocolDeviation::new(
                                visit,
                                DeviationKind::SkippedAssessment,
                                DeviationSeverity::Minor,
                            )
                            .examination(&step.code)
                            .describe(format!(
                                "Required examination {} skipped at visit {}: {}",
                                step.code, visit.visit_number, skip.reason
                            )),
                        );
                    } else {
                        deviations.push(
                            ProtocolDeviation::new(
                                visit,
                                DeviationKind::MissedAssessment,
                                DeviationSeverity::Major,
                            )
                            .examination(&step.code)
                            .describe(format!(
                                "Required examination {} not performed at visit {}",
                                step.code, visit.visit_number
                            )),
                        );
                    }
                }

                if let Some(open_number) = earliest_open {
                    deviations.push(
                        ProtocolDeviation::new(
                            visit,
                            DeviationKind::OutOfSequence,
                            DeviationSeverity::Minor,
                        )
                        .describe(format!(
                            "Visit {} completed while visit {open_number} is still open",
                            visit.visit_number
                        )),
                    );
                }
            }
            VisitStatus::Missed => {
                deviations.push(
                    ProtocolDeviation::new(visit, DeviationKind::MissedVisit, DeviationSeverity::Major)
                        .describe(format!("Visit {} was missed", visit.visit_number)),
                );
            }
            status if is_open(status) => {
                if window.is_overdue(as_of) {
                    let days = (as_of - window.end).num_days();
                    deviations.push(
                        ProtocolDeviation::new(
                            visit,
                            DeviationKind::OverdueVisit,
                            DeviationSeverity::Major,
                        )
                        .days(days)
                        .describe(format!(
                            "Visit {} is {days} day(s) past its window end {}",
                            visit.visit_number, window.end
                        )),
                    );
                }
                earliest_open.get_or_insert(visit.visit_number);
            }
            _ => {}
        }
    }

    deviations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExaminationStep, OrganizationId, PatientId, SkippedExamination, StudyId};
    use chrono::Utc;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn visit(number: u32, start: NaiveDate, end: NaiveDate, status: VisitStatus) -> Visit {
        Visit {
            id: VisitId::new(format!("v{number}")).unwrap(),
            survey_id: SurveyId::new("s1").unwrap(),
            patient_id: PatientId::new("p1").unwrap(),
            study_id: StudyId::new("st1").unwrap(),
            organization_id: OrganizationId::new("o1").unwrap(),
            visit_number: number,
            name: format!("Visit {number}"),
            scheduled_date: start,
            window_start: start,
            window_end: end,
            actual_date: None,
            status,
            required_examinations: Vec::new(),
            optional_examinations: Vec::new(),
            completed_examinations: Vec::new(),
            skipped_examinations: Vec::new(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_on_time_visit_is_clean() {
        let mut v = visit(1, d(3, 1), d(3, 5), VisitStatus::Completed);
        v.actual_date = Some(d(3, 3));
        assert!(detect_deviations(&[v], d(4, 1), &DeviationPolicy::default()).is_empty());
    }

    #[test]
    fn test_timing_severity_threshold() {
        let mut late = visit(1, d(3, 1), d(3, 5), VisitStatus::Completed);
        late.actual_date = Some(d(3, 12));
        let found = detect_deviations(&[late.clone()], d(4, 1), &DeviationPolicy::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DeviationKind::TimingDeviation);
        assert_eq!(found[0].days_outside, 7);
        assert_eq!(found[0].severity, DeviationSeverity::Minor);

        late.actual_date = Some(d(3, 13));
        let found = detect_deviations(&[late], d(4, 1), &DeviationPolicy::default());
        assert_eq!(found[0].severity, DeviationSeverity::Major);
    }

    #[test]
    fn test_overdue_and_missed() {
        let open = visit(1, d(3, 1), d(3, 5), VisitStatus::Scheduled);
        let missed = visit(2, d(4, 1), d(4, 5), VisitStatus::Missed);
        let found = detect_deviations(&[missed, open], d(3, 8), &DeviationPolicy::default());

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, DeviationKind::OverdueVisit);
        assert_eq!(found[0].days_outside, 3);
        assert_eq!(found[1].kind, DeviationKind::MissedVisit);
        assert!(found.iter().all(|f| f.severity == DeviationSeverity::Major));
    }

    #[test]
    fn test_assessments() {
        let mut v = visit(1, d(3, 1), d(3, 5), VisitStatus::Completed);
        v.actual_date = Some(d(3, 2));
        v.required_examinations = vec![
            ExaminationStep::new("ECG", "ECG", 1),
            ExaminationStep::new("LAB", "Labs", 2),
            ExaminationStep::new("VITALS", "Vitals", 3),
        ];
        v.completed_examinations = vec!["VITALS".to_string()];
        v.skipped_examinations = vec![SkippedExamination {
            code: "LAB".to_string(),
            reason: "sample haemolysed".to_string(),
        }];

        let found = detect_deviations(&[v], d(3, 2), &DeviationPolicy::default());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, DeviationKind::MissedAssessment);
        assert_eq!(found[0].examination_code.as_deref(), Some("ECG"));
        assert_eq!(found[1].kind, DeviationKind::SkippedAssessment);
        assert_eq!(found[1].severity, DeviationSeverity::Minor);
    }

    #[test]
    fn test_out_of_sequence() {
        let first = visit(1, d(3, 1), d(3, 30), VisitStatus::Scheduled);
        let mut second = visit(2, d(3, 10), d(3, 20), VisitStatus::Completed);
        second.actual_date = Some(d(3, 15));

        let found = detect_deviations(&[second, first], d(3, 16), &DeviationPolicy::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DeviationKind::OutOfSequence);
        assert_eq!(found[0].visit_number, 2);
    }

    #[test]
    fn test_cancelled_visit_ignored() {
        let cancelled = visit(1, d(1, 1), d(1, 2), VisitStatus::Cancelled);
        assert!(detect_deviations(&[cancelled], d(6, 1), &DeviationPolicy::default()).is_empty());
    }
}
