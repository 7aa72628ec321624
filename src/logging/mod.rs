//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON-formatted file logs with daily or hourly rotation
//! - Configurable log levels (overridable through `RUST_LOG`)
//! - Event macros for audit, deviation and access-control logging
//!
//! # Example
//!
//! ```no_run
//! use trialsite::logging::init_logging;
//! use trialsite::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard, LOG_FILE_NAME};

/// Log an audit record once it has been persisted
///
/// # Example
///
/// ```no_run
/// use trialsite::log_audit_event;
/// use trialsite::domain::{AuditEvent, AuditEventType, LogId, Role};
///
/// let record = AuditEvent::new(AuditEventType::LoginSuccess, "user", "login")
///     .actor(None, Role::Viewer)
///     .into_record(LogId::generate(), chrono::Utc::now());
/// log_audit_event!(&record);
/// ```
#[macro_export]
macro_rules! log_audit_event {
    ($record:expr) => {
        tracing::info!(
            log_id = %$record.log_id,
            event_type = %$record.event_type,
            severity = ?$record.severity,
            target_type = %$record.target_type,
            target_id = ?$record.target_id,
            "Audit event recorded"
        );
    };
}

/// Log a detected protocol deviation
#[macro_export]
macro_rules! log_deviation {
    ($deviation:expr) => {
        tracing::warn!(
            visit_id = %$deviation.visit_id,
            survey_id = %$deviation.survey_id,
            visit_number = $deviation.visit_number,
            kind = %$deviation.kind,
            severity = ?$deviation.severity,
            days_outside = $deviation.days_outside,
            "Protocol deviation detected"
        );
    };
}

/// Log a refused permission check
///
/// # Example
///
/// ```no_run
/// use trialsite::log_access_denied;
/// use trialsite::core::access::{Permission, Principal};
///
/// let principal = Principal::system();
/// log_access_denied!(&principal, Permission::DeletePatient, "outside organization");
/// ```
#[macro_export]
macro_rules! log_access_denied {
    ($principal:expr, $permission:expr, $reason:expr) => {
        tracing::warn!(
            username = %$principal.username,
            role = %$principal.role,
            permission = ?$permission,
            reason = $reason,
            "Access denied"
        );
    };
}

/// Log an error with context
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
