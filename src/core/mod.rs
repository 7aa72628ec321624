//! Core business logic for Trialsite.
//!
//! # Modules
//!
//! - [`access`] - Roles, permissions and organization scoping
//! - [`scheduling`] - Visit windows, planning, progress and deviation detection
//! - [`services`] - Audited operations over the document store and identity provider
//! - [`reports`] - Compliance and study progress reports
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trialsite::adapters::identity::MemoryIdentityProvider;
//! use trialsite::adapters::memory::MemoryStore;
//! use trialsite::config::TrialsiteConfig;
//! use trialsite::core::access::Principal;
//! use trialsite::core::services::Services;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrialsiteConfig::default();
//! let services = Services::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryIdentityProvider::new()),
//!     &config,
//! );
//!
//! let organizations = services.organizations.list(&Principal::system()).await?;
//! println!("{} organizations", organizations.len());
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod reports;
pub mod scheduling;
pub mod services;
