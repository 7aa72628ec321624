//! Visit schedule generation from a study's visit templates

use super::window::VisitWindow;
use crate::domain::{
    ClinicalStudy, Result, Survey, TrialError, Visit, VisitId, VisitStatus, VisitTemplate,
};
use chrono::{NaiveDate, TimeDelta, Utc};

/// Target date and protocol window of a template relative to `baseline`
///
/// # Errors
///
/// Returns [`TrialError::Validation`] when the dates fall outside the calendar
pub fn template_window(
    template: &VisitTemplate,
    baseline: NaiveDate,
) -> Result<(NaiveDate, VisitWindow)> {
    let out_of_range = || {
        TrialError::Validation(format!(
            "visit {} cannot be scheduled {} days from {}",
            template.visit_number, template.day_offset, baseline
        ))
    };

    let scheduled = TimeDelta::try_days(template.day_offset)
        .and_then(|offset| baseline.checked_add_signed(offset))
        .ok_or_else(out_of_range)?;
    let window = VisitWindow::around(
        scheduled,
        template.window_before_days,
        template.window_after_days,
    )
    .ok_or_else(out_of_range)?;
    Ok((scheduled, window))
}

/// Builds one scheduled visit per template, ordered by visit number
///
/// # Errors
///
/// Fails when a template's dates cannot be computed from `baseline`
pub fn plan_visits(
    study: &ClinicalStudy,
    survey: &Survey,
    baseline: NaiveDate,
) -> Result<Vec<Visit>> {
    let mut templates: Vec<&VisitTemplate> = study.visit_templates.iter().collect();
    templates.sort_by_key(|t| t.visit_number);

    let now = Utc::now();
    templates
        .into_iter()
        .map(|template| {
            let (scheduled, window) = template_window(template, baseline)?;
            Ok(Visit {
                id: VisitId::generate(),
                survey_id: survey.id.clone(),
                patient_id: survey.patient_id.clone(),
                study_id: study.id.clone(),
                organization_id: survey.organization_id.clone(),
                visit_number: template.visit_number,
                name: template.name.clone(),
                scheduled_date: scheduled,
                window_start: window.start,
                window_end: window.end,
                actual_date: None,
                status: VisitStatus::Scheduled,
                required_examinations: template.required_examinations.clone(),
                optional_examinations: template.optional_examinations.clone(),
                completed_examinations: Vec::new(),
                skipped_examinations: Vec::new(),
                notes: None,
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
}

/// Window end of the last visit, or `baseline` for a study without visits
///
/// # Errors
///
/// Fails when the last template's window cannot be computed
pub fn expected_completion_date(study: &ClinicalStudy, baseline: NaiveDate) -> Result<NaiveDate> {
    match study.visit_templates.iter().max_by_key(|t| t.visit_number) {
        Some(last) => Ok(template_window(last, baseline)?.1.end),
        None => Ok(baseline),
    }
}

/// Moves a visit to `new_date`; the protocol window stays where it was
pub fn reschedule(visit: &mut Visit, new_date: NaiveDate) {
    visit.scheduled_date = new_date;
    visit.status = VisitStatus::Rescheduled;
    visit.updated_at = Utc::now();
}

/// Window recorded on a visit
pub fn visit_window(visit: &Visit) -> VisitWindow {
    VisitWindow {
        start: visit.window_start,
        end: visit.window_end,
    }
}
