//! Document store abstraction layer
//!
//! This module provides a trait-based abstraction over the document store,
//! allowing trialsite to run against PostgreSQL or an in-process store.

pub mod factory;
pub mod repository;
pub mod traits;

pub use factory::{create_document_store, create_identity_provider};
pub use repository::{Entity, Repositories, Repository};
pub use traits::{matches_filters, AttributeFilter, DocumentStore};
