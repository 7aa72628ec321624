//! Visit scheduling, survey progress and protocol deviations
//!
//! All functions here are pure: they take in-memory visits and dates and
//! return new values, leaving persistence to the services.
//!
//! - [`window`] - inclusive date windows and distance arithmetic
//! - [`planner`] - visit schedule generation and rescheduling
//! - [`progress`] - completion counters and percentages
//! - [`deviation`] - protocol deviation detection

pub mod deviation;
pub mod planner;
pub mod progress;
pub mod window;

pub use deviation::{
    detect_deviations, DeviationKind, DeviationPolicy, DeviationSeverity, ProtocolDeviation,
};
pub use planner::{expected_completion_date, plan_visits, reschedule};
pub use progress::{completion_percentage, SurveyProgress};
pub use window::VisitWindow;
