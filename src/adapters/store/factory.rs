//! Adapter factory
//!
//! This module provides factory functions that build the configured store and
//! identity provider behind trait objects.

use crate::adapters::identity::{IdentityProvider, MemoryIdentityProvider, UserPoolClient};
use crate::adapters::memory::MemoryStore;
use crate::adapters::postgresql::{PostgreSQLClient, PostgreSQLStore};
use crate::adapters::store::traits::DocumentStore;
use crate::config::schema::{IdentityProviderKind, StoreBackend, TrialsiteConfig};
use crate::domain::{Result, TrialError};
use std::sync::Arc;

/// Create a document store based on the configuration
///
/// # Errors
///
/// Returns an error if the backend section is missing or the client cannot
/// be created
pub async fn create_document_store(config: &TrialsiteConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Creating in-memory document store");
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn DocumentStore>)
        }
        StoreBackend::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                TrialError::Configuration(
                    "postgresql configuration is required when store_backend = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL document store");
            let client = PostgreSQLClient::new(pg_config.clone()).await?;
            Ok(Arc::new(PostgreSQLStore::new(client)) as Arc<dyn DocumentStore>)
        }
    }
}

/// Create an identity provider based on the configuration
///
/// # Errors
///
/// Returns an error if the user pool settings are incomplete
pub fn create_identity_provider(config: &TrialsiteConfig) -> Result<Arc<dyn IdentityProvider>> {
    match config.identity.provider {
        IdentityProviderKind::Memory => {
            tracing::info!("Creating in-memory identity provider");
            Ok(Arc::new(MemoryIdentityProvider::new()) as Arc<dyn IdentityProvider>)
        }
        IdentityProviderKind::UserPool => {
            tracing::info!("Creating user pool identity client");
            let client = UserPoolClient::new(config.identity.clone())?;
            Ok(Arc::new(client) as Arc<dyn IdentityProvider>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_builds_memory_adapters() {
        let config = TrialsiteConfig::default();
        let store = create_document_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
        assert!(create_identity_provider(&config).is_ok());
    }

    #[tokio::test]
    async fn test_postgres_without_section_fails() {
        let config = TrialsiteConfig {
            store_backend: StoreBackend::PostgreSQL,
            ..Default::default()
        };
        assert!(matches!(
            create_document_store(&config).await,
            Err(TrialError::Configuration(_))
        ));
    }
}
