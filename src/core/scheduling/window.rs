//! Visit date windows

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

/// Inclusive range of dates in which a visit is on protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl VisitWindow {
    /// Window of `before` days ahead of and `after` days past `scheduled`
    ///
    /// Negative allowances are treated as zero. Returns `None` when either
    /// bound falls outside the representable calendar.
    pub fn around(scheduled: NaiveDate, before: i64, after: i64) -> Option<Self> {
        let start = scheduled.checked_sub_signed(TimeDelta::try_days(before.max(0))?)?;
        let end = scheduled.checked_add_signed(TimeDelta::try_days(after.max(0))?)?;
        Some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Signed distance from the window: 0 inside, negative when early,
    /// positive when late
    pub fn deviation_days(&self, date: NaiveDate) -> i64 {
        if date < self.start {
            (date - self.start).num_days()
        } else if date > self.end {
            (date - self.end).num_days()
        } else {
            0
        }
    }

    /// The window has closed as of `as_of`
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        as_of > self.end
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}
