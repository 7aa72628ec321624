//! Integration tests for visit planning and deviation rules

use chrono::NaiveDate;
use test_case::test_case;
use trialsite::core::scheduling::{
    completion_percentage, detect_deviations, expected_completion_date, plan_visits,
    DeviationKind, DeviationPolicy, DeviationSeverity, SurveyProgress, VisitWindow,
};
use trialsite::domain::{
    ClinicalStudy, ExaminationStep, OrganizationId, PatientId, Survey, Visit, VisitStatus,
    VisitTemplate,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn baseline() -> NaiveDate {
    d(2025, 1, 1)
}

fn study() -> ClinicalStudy {
    ClinicalStudy::new(
        "CARDIO-01",
        "Cardiology follow-up",
        "2.1",
        vec![
            VisitTemplate::new(1, "Screening", 0)
                .with_required(ExaminationStep::new("ECG", "Electrocardiogram", 1)),
            VisitTemplate::new(2, "Week 4", 28)
                .with_window(3, 3)
                .with_required(ExaminationStep::new("LAB", "Blood panel", 1))
                .with_optional(ExaminationStep::new("QOL", "Quality of life", 2)),
            VisitTemplate::new(3, "Week 12", 84).with_window(7, 7),
        ],
    )
    .unwrap()
}

fn planned() -> Vec<Visit> {
    let study = study();
    let survey = Survey::new(
        PatientId::generate(),
        study.id.clone(),
        OrganizationId::new("site-1").unwrap(),
        baseline(),
    );
    plan_visits(&study, &survey, baseline()).unwrap()
}

fn complete(visit: &mut Visit, on: NaiveDate) {
    visit.status = VisitStatus::Completed;
    visit.actual_date = Some(on);
    visit.completed_examinations = visit
        .required_examinations
        .iter()
        .map(|s| s.code.clone())
        .collect();
}

#[test]
fn test_plan_follows_templates() {
    let visits = planned();
    assert_eq!(visits.len(), 3);
    assert_eq!(visits[1].scheduled_date, d(2025, 1, 29));
    assert_eq!(visits[1].window_start, d(2025, 1, 26));
    assert_eq!(visits[1].window_end, d(2025, 2, 1));
    assert!(visits.iter().all(|v| v.status == VisitStatus::Scheduled));
    assert_eq!(
        expected_completion_date(&study(), baseline()).unwrap(),
        d(2025, 4, 2)
    );
}

#[test_case(d(2025, 1, 29), 0 ; "on target")]
#[test_case(d(2025, 1, 26), 0 ; "first day of window")]
#[test_case(d(2025, 2, 1), 0 ; "last day of window")]
#[test_case(d(2025, 1, 24), -2 ; "two days early")]
#[test_case(d(2025, 2, 11), 10 ; "ten days late")]
fn test_window_distance(actual: NaiveDate, expected: i64) {
    let window = VisitWindow::around(d(2025, 1, 29), 3, 3).unwrap();
    assert_eq!(window.deviation_days(actual), expected);
}

#[test_case(3, DeviationSeverity::Minor ; "short of threshold")]
#[test_case(7, DeviationSeverity::Minor ; "at threshold")]
#[test_case(8, DeviationSeverity::Major ; "beyond threshold")]
#[test_case(-9, DeviationSeverity::Major ; "early beyond threshold")]
fn test_timing_severity(days: i64, expected: DeviationSeverity) {
    assert_eq!(DeviationPolicy::default().timing_severity(days), expected);
}

#[test_case(0, 0, 0)]
#[test_case(1, 3, 33)]
#[test_case(2, 3, 67)]
#[test_case(3, 3, 100)]
fn test_completion_percentage(completed: u32, total: u32, expected: u8) {
    assert_eq!(completion_percentage(completed, total), expected);
}

#[test]
fn test_clean_survey_has_no_deviations() {
    let mut visits = planned();
    complete(&mut visits[0], d(2025, 1, 1));
    complete(&mut visits[1], d(2025, 1, 30));

    let deviations = detect_deviations(&visits, d(2025, 2, 15), &DeviationPolicy::default());
    assert!(deviations.is_empty(), "unexpected {deviations:?}");
}

#[test]
fn test_late_visit_and_overdue_follow_up() {
    let mut visits = planned();
    complete(&mut visits[0], d(2025, 1, 1));
    complete(&mut visits[1], d(2025, 2, 11));

    let deviations = detect_deviations(&visits, d(2025, 4, 20), &DeviationPolicy::default());
    let kinds: Vec<(u32, DeviationKind, DeviationSeverity)> = deviations
        .iter()
        .map(|d| (d.visit_number, d.kind, d.severity))
        .collect();

    assert_eq!(
        kinds,
        vec![
            (2, DeviationKind::TimingDeviation, DeviationSeverity::Major),
            (3, DeviationKind::OverdueVisit, DeviationSeverity::Major),
        ]
    );
    assert_eq!(deviations[0].days_outside, 10);
}

#[test]
fn test_assessment_findings() {
    let mut visits = planned();
    complete(&mut visits[0], d(2025, 1, 1));
    visits[0].completed_examinations.clear();

    let deviations = detect_deviations(&visits, d(2025, 1, 2), &DeviationPolicy::default());
    assert_eq!(deviations.len(), 1);
    assert_eq!(deviations[0].kind, DeviationKind::MissedAssessment);
    assert_eq!(deviations[0].examination_code.as_deref(), Some("ECG"));
}

#[test]
fn test_out_of_sequence_completion() {
    let mut visits = planned();
    complete(&mut visits[1], d(2025, 1, 29));

    let deviations = detect_deviations(&visits, d(2025, 1, 1), &DeviationPolicy::default());
    assert!(deviations
        .iter()
        .any(|d| d.kind == DeviationKind::OutOfSequence && d.visit_number == 2));
}

#[test]
fn test_detection_is_repeatable() {
    let mut visits = planned();
    visits[0].status = VisitStatus::Missed;
    let policy = DeviationPolicy::default();

    let first = detect_deviations(&visits, d(2025, 6, 1), &policy);
    let second = detect_deviations(&visits, d(2025, 6, 1), &policy);
    assert_eq!(first, second);
    assert_eq!(first[0].kind, DeviationKind::MissedVisit);
}

#[test]
fn test_progress_counts() {
    let mut visits = planned();
    complete(&mut visits[0], d(2025, 1, 1));
    visits[1].status = VisitStatus::Missed;

    let progress = SurveyProgress::from_visits(&visits);
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.missed, 1);
    assert_eq!(progress.open, 1);
    assert_eq!(progress.percentage(), 33);
    assert!(!progress.is_finished());
}
