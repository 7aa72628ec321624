//! External system integrations for trialsite.
//!
//! This module provides adapters for integrating with external systems:
//!
//! - [`store`] - Document store abstraction, typed repositories and factory
//! - [`memory`] - In-process document store
//! - [`postgresql`] - PostgreSQL JSONB document store
//! - [`identity`] - Managed user pool (HTTP client and in-memory provider)
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with in-memory implementations. Services only see the
//! [`store::DocumentStore`] and [`identity::IdentityProvider`] traits.
//!
//! ```rust,no_run
//! use trialsite::adapters::store::{create_document_store, Repositories};
//! use trialsite::config::TrialsiteConfig;
//!
//! # async fn example() -> trialsite::domain::Result<()> {
//! let config = TrialsiteConfig::default();
//! let store = create_document_store(&config).await?;
//! store.ensure_schema().await?;
//! let repos = Repositories::new(store);
//! let organizations = repos.organizations.list().await?;
//! # Ok(())
//! # }
//! ```

pub mod identity;
pub mod memory;
pub mod postgresql;
pub mod store;
