//! Completion bookkeeping for surveys

use crate::domain::{Survey, SurveyStatus, Visit, VisitStatus};
use chrono::Utc;

/// `round(completed / total * 100)`, 0 when `total` is 0, never above 100
pub fn completion_percentage(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(completed) / f64::from(total) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Visit counts for one survey
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurveyProgress {
    pub total: u32,
    pub completed: u32,
    pub missed: u32,
    pub cancelled: u32,
    /// Scheduled, in progress or rescheduled
    pub open: u32,
}

impl SurveyProgress {
    pub fn from_visits(visits: &[Visit]) -> Self {
        visits.iter().fold(Self::default(), |mut p, visit| {
            p.total += 1;
            match visit.status {
                VisitStatus::Completed => p.completed += 1,
                VisitStatus::Missed => p.missed += 1,
                VisitStatus::Cancelled => p.cancelled += 1,
                VisitStatus::Scheduled | VisitStatus::InProgress | VisitStatus::Rescheduled => {
                    p.open += 1
                }
            }
            p
        })
    }

    pub fn percentage(&self) -> u8 {
        completion_percentage(self.completed, self.total)
    }

    /// Every visit is closed and at least one was completed
    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.open == 0 && self.completed > 0
    }

    /// Writes the counters onto `survey`
    ///
    /// Returns `true` when this call moved the survey to completed. A
    /// withdrawn survey keeps its status.
    pub fn apply_to(&self, survey: &mut Survey) -> bool {
        survey.total_visits = self.total;
        survey.completed_visits = self.completed;
        survey.missed_visits = self.missed;
        survey.completion_percentage = self.percentage();
        survey.updated_at = Utc::now();

        if survey.status == SurveyStatus::Active && self.is_finished() {
            survey.status = SurveyStatus::Completed;
            return true;
        }
        false
    }
}
