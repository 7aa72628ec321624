//! Domain models and types for trialsite.
//!
//! This module contains the entities of a clinical trial site, their
//! identifiers and the error hierarchy.
//!
//! # Overview
//!
//! - **Strongly-typed identifiers** ([`OrganizationId`], [`PatientId`], [`StudyId`], ...)
//! - **Entities** ([`Organization`], [`ClinicalStudy`], [`Patient`], [`Survey`],
//!   [`Visit`], [`User`], [`AuditLogRecord`])
//! - **Error types** ([`TrialError`], [`StoreError`], [`IdentityError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! ```rust
//! use trialsite::domain::{PatientId, StudyId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let patient_id = PatientId::new("p-123")?;
//! let study_id = StudyId::new("study-456")?;
//!
//! // This won't compile - type safety prevents mixing IDs
//! // let wrong: PatientId = study_id;
//! # Ok(())
//! # }
//! ```
//!
//! # Builder Pattern
//!
//! ```rust
//! use trialsite::domain::{Organization, OrganizationType};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let org = Organization::builder()
//!     .name("University Hospital")
//!     .code("UH-01")
//!     .organization_type(OrganizationType::Hospital)
//!     .capacity(40)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod errors;
pub mod ids;
pub mod organization;
pub mod patient;
pub mod result;
pub mod study;
pub mod survey;
pub mod user;
pub mod visit;

// Re-export commonly used types for convenience
pub use audit::{AuditEvent, AuditEventType, AuditLogRecord, ChangeSet, FieldChange, Severity};
pub use errors::{IdentityError, StoreError, TrialError};
pub use ids::{LogId, OrganizationId, PatientId, StudyId, SurveyId, UserId, VisitId};
pub use organization::{
    Address, Organization, OrganizationBuilder, OrganizationStatus, OrganizationType,
};
pub use patient::{Patient, PatientStatus, Sex};
pub use result::Result;
pub use study::{ClinicalStudy, ExaminationStep, StudyPhase, StudyStatus, VisitTemplate};
pub use survey::{Survey, SurveyStatus};
pub use user::{Role, User};
pub use visit::{SkippedExamination, Visit, VisitStatus};
