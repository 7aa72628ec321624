//! Integration tests for logging functionality
//!
//! A global subscriber can only be installed once per process, so a single
//! test in this binary calls `init_logging` successfully.

use tempfile::TempDir;
use trialsite::config::LoggingConfig;
use trialsite::domain::TrialError;
use trialsite::logging::{init_logging, LOG_FILE_NAME};

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_path, "/var/log/trialsite");
    assert_eq!(config.local_rotation, "daily");
    assert!(!config.json_console);
}

#[test]
fn test_invalid_level_is_rejected_before_setup() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("never-created");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        ..Default::default()
    };

    let result = init_logging("chatty", &config);
    assert!(matches!(result, Err(TrialError::Configuration(_))));
    assert!(!log_path.exists());
}

#[test]
fn test_file_logging_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "hourly".to_string(),
        json_console: true,
    };

    let guard = init_logging("debug", &config).unwrap();
    assert!(guard.has_file_writer());
    assert!(log_path.is_dir());

    tracing::info!(study_id = "study-1", "written to the rolling file");
    drop(guard);

    let written = std::fs::read_dir(&log_path)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name().to_string_lossy().starts_with(LOG_FILE_NAME));
    assert!(written);
}
