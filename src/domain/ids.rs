//! Domain identifier types with validation
//!
//! Every stored entity is addressed by its own newtype so that a patient id
//! can never be passed where a study id is expected. All identifiers are
//! opaque non-empty strings; freshly created entities get a UUID v4.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from a string
            ///
            /// # Errors
            ///
            /// Returns an error if the identifier is empty or whitespace
            pub fn new(id: impl Into<String>) -> Result<Self, String> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(concat!($label, " cannot be empty").to_string());
                }
                Ok(Self(id))
            }

            /// Generates a fresh random identifier
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Returns the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes self and returns the inner String
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifier of a participating site (hospital, clinic, lab)
    OrganizationId,
    "Organization ID"
);

define_id!(
    /// Identifier of an enrolled or screened patient
    PatientId,
    "Patient ID"
);

define_id!(
    /// Identifier of a clinical study protocol
    ///
    /// # Examples
    ///
    /// ```
    /// use trialsite::domain::ids::StudyId;
    /// use std::str::FromStr;
    ///
    /// let study_id = StudyId::from_str("study-001").unwrap();
    /// assert_eq!(study_id.as_str(), "study-001");
    /// assert!(StudyId::new("  ").is_err());
    /// ```
    StudyId,
    "Study ID"
);

define_id!(
    /// Identifier of one patient's enrollment in one study
    SurveyId,
    "Survey ID"
);

define_id!(
    /// Identifier of a scheduled visit
    VisitId,
    "Visit ID"
);

define_id!(
    /// Identifier of an application user
    UserId,
    "User ID"
);

define_id!(
    /// Identifier of an audit log record
    LogId,
    "Log ID"
);
