//! Read-only aggregations for monitors and sponsors

pub mod compliance;
pub mod study_progress;

pub use compliance::{
    ActorActivity, ComplianceReport, DataModifications, NotableEvent, ReportPeriod, TOP_ACTORS,
};
pub use study_progress::{StudyProgressReport, SurveyCounts};
