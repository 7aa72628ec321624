//! Configuration management for trialsite.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! trialsite uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `TRIALSITE_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trialsite::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("trialsite.toml")?;
//! println!("Retention: {} days", config.audit.retention_days);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`PostgreSQLConfig`] - Document store connection (when `store_backend = "postgresql"`)
//! - [`IdentityConfig`] - User pool endpoint and app client
//! - [`SchedulingConfig`] - Deviation thresholds and reminder horizon
//! - [`AuditConfig`] - Audit trail switch and retention
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//! store_backend = "postgresql"
//!
//! [application]
//! log_level = "info"
//!
//! [postgresql]
//! connection_string = "${TRIALSITE_PG_URL}"
//!
//! [identity]
//! provider = "user_pool"
//! endpoint = "https://cognito-idp.eu-west-1.amazonaws.com"
//! user_pool_id = "eu-west-1_AbCdEf"
//! client_id = "4j8k2example"
//! client_secret = "${TRIALSITE_CLIENT_SECRET}"
//!
//! [audit]
//! retention_days = 2557
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApplicationConfig, AuditConfig, Environment, IdentityConfig, IdentityProviderKind,
    LoggingConfig, PostgreSQLConfig, RetryConfig, SchedulingConfig, StoreBackend,
    TrialsiteConfig, MAX_RETENTION_DAYS,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
