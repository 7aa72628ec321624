//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod audit_sweep;
pub mod deviations;
pub mod init;
pub mod report;
pub mod validate;

use crate::adapters::store::{create_document_store, create_identity_provider};
use crate::cli::{exit_code_for, EXIT_CONFIG};
use crate::config::{load_config, TrialsiteConfig};
use crate::core::services::Services;

/// Loads the configuration and connects the configured adapters
///
/// On failure the message is printed and the exit code to use is returned.
pub(crate) async fn connect(
    config_path: &str,
) -> std::result::Result<(TrialsiteConfig, Services), i32> {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            println!("❌ Failed to load configuration file");
            println!("   Error: {e}");
            return Err(EXIT_CONFIG);
        }
    };

    let store = match create_document_store(&config).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create document store");
            println!("❌ Failed to connect to document store");
            println!("   Error: {e}");
            return Err(exit_code_for(&e));
        }
    };

    let identity = match create_identity_provider(&config) {
        Ok(i) => i,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create identity provider");
            println!("❌ Failed to create identity provider");
            println!("   Error: {e}");
            return Err(exit_code_for(&e));
        }
    };

    let services = Services::new(store, identity, &config);
    Ok((config, services))
}
