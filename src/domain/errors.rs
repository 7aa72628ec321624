//! Domain error types
//!
//! This module defines the error hierarchy for trialsite. All errors are
//! domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main trialsite error type
///
/// This is the primary error type used throughout the application.
/// It wraps subsystem errors and carries the business-rule failures that
/// services report to their callers.
#[derive(Debug, Error)]
pub enum TrialError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Document store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Identity provider errors
    #[error("Identity provider error: {0}")]
    Identity(#[from] IdentityError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Entity already exists or the operation conflicts with current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller is not authenticated
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Study is not accepting enrollments
    #[error("Enrollment closed: {0}")]
    EnrollmentClosed(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl TrialError {
    /// Shorthand for a [`TrialError::NotFound`]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        TrialError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether the error is caused by the caller rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TrialError::Validation(_)
                | TrialError::NotFound { .. }
                | TrialError::Conflict(_)
                | TrialError::Unauthorized(_)
                | TrialError::Forbidden(_)
                | TrialError::EnrollmentClosed(_)
        )
    }
}

/// Document store errors
///
/// Errors that occur when reading or writing the backing document store.
/// These errors don't expose driver types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the store
    #[error("Failed to connect to store: {0}")]
    ConnectionFailed(String),

    /// Query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Write failed
    #[error("Failed to write document: {0}")]
    WriteFailed(String),

    /// Create-only write hit an existing key
    #[error("Document already exists: {table}/{id}")]
    AlreadyExists { table: String, id: String },

    /// Stored document could not be decoded
    #[error("Failed to deserialize document: {0}")]
    DeserializationFailed(String),
}

/// Identity provider errors
///
/// Errors that occur when interacting with the user pool.
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Failed to reach the identity provider
    #[error("Failed to connect to identity provider: {0}")]
    ConnectionFailed(String),

    /// Credentials rejected or token invalid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// User does not exist in the pool
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Username already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Password does not satisfy the pool policy
    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Response body could not be interpreted
    #[error("Invalid response from identity provider: {0}")]
    InvalidResponse(String),

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

impl IdentityError {
    /// Whether retrying the request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IdentityError::ConnectionFailed(_)
                | IdentityError::Timeout(_)
                | IdentityError::ServerError { .. }
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for TrialError {
    fn from(err: std::io::Error) -> Self {
        TrialError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for TrialError {
    fn from(err: serde_json::Error) -> Self {
        TrialError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for TrialError {
    fn from(err: toml::de::Error) -> Self {
        TrialError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_error_display() {
        let err = TrialError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_not_found_display() {
        let err = TrialError::not_found("Patient", "p-1");
        assert_eq!(err.to_string(), "Patient not found: p-1");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_store_error_conversion() {
        let store_err = StoreError::QueryFailed("timeout".to_string());
        let err: TrialError = store_err.into();
        assert!(matches!(err, TrialError::Store(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_identity_error_conversion() {
        let id_err = IdentityError::UserExists("alice".to_string());
        let err: TrialError = id_err.into();
        assert!(matches!(err, TrialError::Identity(_)));
    }

    #[test]
    fn test_identity_error_retryable() {
        assert!(IdentityError::Timeout("30s".to_string()).is_retryable());
        assert!(IdentityError::ServerError {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_retryable());
        assert!(!IdentityError::UserNotFound("bob".to_string()).is_retryable());
    }

    #[test]
    fn test_already_exists_display() {
        let err = StoreError::AlreadyExists {
            table: "audit_logs".to_string(),
            id: "log-1".to_string(),
        };
        assert_eq!(err.to_string(), "Document already exists: audit_logs/log-1");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: TrialError = io_err.into();
        assert!(matches!(err, TrialError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: TrialError = json_err.into();
        assert!(matches!(err, TrialError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: TrialError = toml_err.into();
        assert!(matches!(err, TrialError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
