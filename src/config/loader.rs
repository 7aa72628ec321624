//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{IdentityProviderKind, StoreBackend, TrialsiteConfig};
use super::secret::secret_string;
use crate::domain::errors::TrialError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`TrialsiteConfig`]
/// 4. Applies environment variable overrides (`TRIALSITE_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`TrialError::Configuration`] if the file is missing or
/// unreadable, a referenced variable is unset, the TOML is malformed, or
/// validation fails.
///
/// # Examples
///
/// ```no_run
/// use trialsite::config::loader::load_config;
///
/// let config = load_config("trialsite.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TrialsiteConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(TrialError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        TrialError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Loads configuration from TOML text
///
/// Same pipeline as [`load_config`] without the file access.
pub fn load_config_from_str(contents: &str) -> Result<TrialsiteConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: TrialsiteConfig = toml::from_str(&contents)
        .map_err(|e| TrialError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        TrialError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex"))
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = env_var_pattern();
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(TrialError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using the `TRIALSITE_*` prefix
///
/// Variables follow `TRIALSITE_<SECTION>_<KEY>`, for example
/// `TRIALSITE_AUDIT_RETENTION_DAYS` or `TRIALSITE_IDENTITY_CLIENT_SECRET`.
fn apply_env_overrides(config: &mut TrialsiteConfig) -> Result<()> {
    if let Ok(val) = std::env::var("TRIALSITE_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    if let Ok(val) = std::env::var("TRIALSITE_STORE_BACKEND") {
        config.store_backend = match val.to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "postgresql" => StoreBackend::PostgreSQL,
            other => {
                return Err(TrialError::Configuration(format!(
                    "Invalid TRIALSITE_STORE_BACKEND '{other}'. Must be one of: memory, postgresql"
                )))
            }
        };
    }

    // PostgreSQL overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg_config) = config.postgresql {
        if let Ok(val) = std::env::var("TRIALSITE_POSTGRESQL_CONNECTION_STRING") {
            pg_config.connection_string = secret_string(val);
        }
        if let Ok(val) = std::env::var("TRIALSITE_POSTGRESQL_MAX_CONNECTIONS") {
            if let Ok(max) = val.parse() {
                pg_config.max_connections = max;
            }
        }
    }

    // Identity overrides
    if let Ok(val) = std::env::var("TRIALSITE_IDENTITY_PROVIDER") {
        config.identity.provider = match val.to_lowercase().as_str() {
            "memory" => IdentityProviderKind::Memory,
            "user_pool" => IdentityProviderKind::UserPool,
            other => {
                return Err(TrialError::Configuration(format!(
                    "Invalid TRIALSITE_IDENTITY_PROVIDER '{other}'. Must be one of: memory, user_pool"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("TRIALSITE_IDENTITY_ENDPOINT") {
        config.identity.endpoint = Some(val);
    }
    if let Ok(val) = std::env::var("TRIALSITE_IDENTITY_USER_POOL_ID") {
        config.identity.user_pool_id = Some(val);
    }
    if let Ok(val) = std::env::var("TRIALSITE_IDENTITY_CLIENT_ID") {
        config.identity.client_id = Some(val);
    }
    if let Ok(val) = std::env::var("TRIALSITE_IDENTITY_CLIENT_SECRET") {
        config.identity.client_secret = Some(secret_string(val));
    }

    // Scheduling overrides
    if let Ok(val) = std::env::var("TRIALSITE_SCHEDULING_MAJOR_DEVIATION_DAYS") {
        if let Ok(days) = val.parse() {
            config.scheduling.major_deviation_days = days;
        }
    }

    // Audit overrides
    if let Ok(val) = std::env::var("TRIALSITE_AUDIT_ENABLED") {
        config.audit.enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("TRIALSITE_AUDIT_RETENTION_DAYS") {
        if let Ok(days) = val.parse() {
            config.audit.retention_days = days;
        }
    }

    // Logging overrides
    if let Ok(val) = std::env::var("TRIALSITE_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("TRIALSITE_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
