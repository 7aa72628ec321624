//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the trialsite configuration file.

use crate::cli::{EXIT_CONFIG, EXIT_OK};
use crate::adapters::postgresql::client::redact_connection_string;
use crate::config::schema::{IdentityProviderKind, PostgreSQLConfig, StoreBackend};
use crate::config::{load_config, TrialsiteConfig};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading also validates every section
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                println!();
                return Ok(EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        print_summary(&config);
        Ok(EXIT_OK)
    }
}

fn connection_target(pg_config: &PostgreSQLConfig) -> String {
    use secrecy::ExposeSecret;
    redact_connection_string(pg_config.connection_string.expose_secret().as_ref())
}

fn print_summary(config: &TrialsiteConfig) {
    println!("Configuration Summary:");
    println!("  Environment: {:?}", config.environment);
    println!("  Log Level: {}", config.application.log_level);

    match config.store_backend {
        StoreBackend::Memory => println!("  Store Backend: memory"),
        StoreBackend::PostgreSQL => {
            if let Some(ref pg_config) = config.postgresql {
                println!("  Store Backend: PostgreSQL");
                println!("  PostgreSQL Connection: {}", connection_target(pg_config));
                println!("  Max Connections: {}", pg_config.max_connections);
            }
        }
    }

    match config.identity.provider {
        IdentityProviderKind::Memory => println!("  Identity Provider: memory"),
        IdentityProviderKind::UserPool => {
            println!("  Identity Provider: user pool");
            println!(
                "  Endpoint: {}",
                config.identity.endpoint.as_deref().unwrap_or("-")
            );
            println!(
                "  User Pool: {}",
                config.identity.user_pool_id.as_deref().unwrap_or("-")
            );
            println!(
                "  Client Secret: {}",
                if config.identity.client_secret.is_some() {
                    "set"
                } else {
                    "not set"
                }
            );
        }
    }

    println!(
        "  Major Deviation Threshold: {} days",
        config.scheduling.major_deviation_days
    );
    println!(
        "  Audit: {} (retention {} days)",
        if config.audit.enabled { "enabled" } else { "disabled" },
        config.audit.retention_days
    );
    println!();
}
