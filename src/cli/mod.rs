//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for trialsite using clap.

pub mod commands;

use crate::domain::{IdentityError, StoreError, TrialError};
use clap::{Parser, Subcommand};

/// Exit code for a successful run
pub const EXIT_OK: i32 = 0;
/// Exit code when the run succeeded but found deviations or compliance findings
pub const EXIT_FINDINGS: i32 = 1;
/// Exit code for missing or invalid configuration
pub const EXIT_CONFIG: i32 = 2;
/// Exit code when the store or identity provider cannot be reached
pub const EXIT_CONNECTION: i32 = 4;
/// Exit code for every other failure
pub const EXIT_FATAL: i32 = 5;

/// Trialsite - Clinical trial site management
#[derive(Parser, Debug)]
#[command(name = "trialsite")]
#[command(version, about, long_about = None)]
#[command(author = "Trialsite Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "trialsite.toml", env = "TRIALSITE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "TRIALSITE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Detect protocol deviations across a study
    Deviations(commands::deviations::DeviationsArgs),

    /// Generate compliance or study progress reports
    Report(commands::report::ReportArgs),

    /// Delete audit records past the retention period
    AuditSweep(commands::audit_sweep::AuditSweepArgs),
}

/// Maps a failure to the process exit code
pub fn exit_code_for(error: &TrialError) -> i32 {
    match error {
        TrialError::Configuration(_) => EXIT_CONFIG,
        TrialError::Store(StoreError::ConnectionFailed(_))
        | TrialError::Identity(IdentityError::ConnectionFailed(_)) => EXIT_CONNECTION,
        _ => EXIT_FATAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["trialsite", "validate-config"]);
        assert_eq!(cli.config, "trialsite.toml");
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_with_config_and_log_level() {
        let cli = Cli::parse_from([
            "trialsite",
            "--config",
            "site.toml",
            "--log-level",
            "debug",
            "init",
        ]);
        assert_eq!(cli.config, "site.toml");
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::Init(_)));
    }

    #[test]
    fn test_cli_parse_deviations() {
        let cli = Cli::parse_from([
            "trialsite",
            "deviations",
            "--study",
            "study-1",
            "--as-of",
            "2025-06-30",
        ]);
        match cli.command {
            Commands::Deviations(args) => {
                assert_eq!(args.study, "study-1");
                assert_eq!(
                    args.as_of,
                    Some(chrono::NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_report_compliance() {
        let cli = Cli::parse_from([
            "trialsite",
            "report",
            "compliance",
            "--from",
            "2025-01-01",
            "--to",
            "2025-01-31",
            "--json",
        ]);
        assert!(matches!(cli.command, Commands::Report(_)));
    }

    #[test]
    fn test_cli_parse_audit_sweep() {
        let cli = Cli::parse_from(["trialsite", "audit-sweep", "--dry-run"]);
        match cli.command {
            Commands::AuditSweep(args) => {
                assert!(args.dry_run);
                assert_eq!(args.retention_days, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            exit_code_for(&TrialError::Configuration("x".into())),
            EXIT_CONFIG
        );
        assert_eq!(
            exit_code_for(&TrialError::Store(StoreError::ConnectionFailed("x".into()))),
            EXIT_CONNECTION
        );
        assert_eq!(
            exit_code_for(&TrialError::Identity(IdentityError::ConnectionFailed(
                "x".into()
            ))),
            EXIT_CONNECTION
        );
        assert_eq!(exit_code_for(&TrialError::Other("x".into())), EXIT_FATAL);
    }
}
