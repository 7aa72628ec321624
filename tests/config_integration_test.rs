//! Integration tests for configuration loading and validation
//!
//! Tests that touch environment variables hold `ENV_MUTEX` so they do not
//! interfere with each other.

use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;
use trialsite::config::{load_config, Environment, IdentityProviderKind, StoreBackend};

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    for name in [
        "TRIALSITE_APPLICATION_LOG_LEVEL",
        "TRIALSITE_STORE_BACKEND",
        "TRIALSITE_IDENTITY_PROVIDER",
        "TRIALSITE_IDENTITY_CLIENT_SECRET",
        "TRIALSITE_AUDIT_ENABLED",
        "TRIALSITE_AUDIT_RETENTION_DAYS",
        "TRIALSITE_SCHEDULING_MAJOR_DEVIATION_DAYS",
        "TRIALSITE_LOGGING_LOCAL_ENABLED",
        "TEST_TRIALSITE_PG_PASSWORD",
        "TEST_TRIALSITE_POOL_SECRET",
    ] {
        std::env::remove_var(name);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_TRIALSITE_PG_PASSWORD", "pg-pass");
    std::env::set_var("TEST_TRIALSITE_POOL_SECRET", "pool-secret");

    let file = write_config(
        r#"
environment = "staging"
store_backend = "postgresql"

[application]
log_level = "debug"

[postgresql]
connection_string = "postgresql://trialsite:${TEST_TRIALSITE_PG_PASSWORD}@db:5432/trialsite"
max_connections = 20

[identity]
provider = "user_pool"
endpoint = "https://cognito-idp.eu-west-1.amazonaws.com"
region = "eu-west-1"
user_pool_id = "eu-west-1_abc"
client_id = "client-1"
client_secret = "${TEST_TRIALSITE_POOL_SECRET}"

[identity.retry]
max_retries = 5
initial_delay_ms = 250

[scheduling]
major_deviation_days = 10
reminder_horizon_days = 21

[audit]
retention_days = 3650

[logging]
local_enabled = false
json_console = true
"#,
    );

    let config = load_config(file.path()).unwrap();
    cleanup_env_vars();

    assert_eq!(config.environment, Environment::Staging);
    assert_eq!(config.store_backend, StoreBackend::PostgreSQL);
    assert_eq!(config.application.log_level, "debug");

    let pg = config.postgresql.as_ref().unwrap();
    assert!(pg.connection_string.expose_secret().as_ref().contains("pg-pass"));
    assert_eq!(pg.max_connections, 20);

    assert_eq!(config.identity.provider, IdentityProviderKind::UserPool);
    assert_eq!(
        config
            .identity
            .client_secret
            .as_ref()
            .map(|s| s.expose_secret().to_string()),
        Some("pool-secret".to_string())
    );
    assert_eq!(config.identity.retry.max_retries, 5);
    assert_eq!(config.identity.retry.initial_delay_ms, 250);
    assert_eq!(config.scheduling.major_deviation_days, 10);
    assert_eq!(config.audit.retention_days, 3650);
    assert!(config.audit.enabled);
    assert!(!config.logging.local_enabled);
}

#[test]
fn test_minimal_config_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config("[application]\nlog_level = \"info\"\n");
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.store_backend, StoreBackend::Memory);
    assert_eq!(config.identity.provider, IdentityProviderKind::Memory);
    assert_eq!(config.scheduling.major_deviation_days, 7);
    assert_eq!(config.audit.retention_days, 2557);
}

#[test]
fn test_missing_substitution_variable() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
store_backend = "postgresql"

[postgresql]
connection_string = "postgresql://trialsite:${TEST_TRIALSITE_PG_PASSWORD}@db/trialsite"
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_TRIALSITE_PG_PASSWORD"));
}

#[test]
fn test_environment_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TRIALSITE_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("TRIALSITE_AUDIT_RETENTION_DAYS", "400");
    std::env::set_var("TRIALSITE_AUDIT_ENABLED", "false");
    std::env::set_var("TRIALSITE_SCHEDULING_MAJOR_DEVIATION_DAYS", "3");

    let file = write_config("[application]\nlog_level = \"info\"\n");
    let config = load_config(file.path());
    cleanup_env_vars();
    let config = config.unwrap();

    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.audit.retention_days, 400);
    assert!(!config.audit.enabled);
    assert_eq!(config.scheduling.major_deviation_days, 3);
}

#[test]
fn test_invalid_backend_override() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TRIALSITE_STORE_BACKEND", "mongodb");

    let file = write_config("");
    let result = load_config(file.path());
    cleanup_env_vars();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("TRIALSITE_STORE_BACKEND"));
}

#[test]
fn test_validation_failures() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let cases = [
        ("[application]\nlog_level = \"loud\"\n", "log_level"),
        ("environment = \"production\"\n", "not allowed in production"),
        ("[audit]\nretention_days = 0\n", "retention_days"),
        ("[audit]\nretention_days = 1000000000000000\n", "retention_days"),
        ("[identity]\nprovider = \"user_pool\"\n", "identity.endpoint"),
        (
            "store_backend = \"postgresql\"\n[postgresql]\nconnection_string = \"mysql://db\"\n",
            "postgresql://",
        ),
        ("[logging]\nlocal_rotation = \"weekly\"\n", "local_rotation"),
    ];

    for (contents, expected) in cases {
        let file = write_config(contents);
        let err = load_config(file.path()).unwrap_err();
        assert!(
            err.to_string().contains(expected),
            "{contents:?} gave {err}"
        );
    }
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/trialsite.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}
