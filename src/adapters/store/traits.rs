//! Document store abstraction
//!
//! Every entity lives in a named table as a JSON document addressed by its
//! id. Secondary lookups are attribute-equality queries on top-level fields,
//! which keeps the contract satisfiable by key-value stores with secondary
//! indexes as well as by a relational JSONB table.

use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Attribute equality filter: `(attribute, expected value)`
pub type AttributeFilter<'a> = (&'a str, &'a str);

/// Document store trait
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs and status output
    fn backend_name(&self) -> &'static str;

    /// Test the store connection
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn test_connection(&self) -> Result<()>;

    /// Create tables and indexes if they are missing
    async fn ensure_schema(&self) -> Result<()>;

    /// Fetch a document by id
    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>>;

    /// Create a document
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`](crate::domain::StoreError::AlreadyExists)
    /// when a document with the same id is already present.
    async fn insert(&self, table: &str, id: &str, document: Value) -> Result<()>;

    /// Create or replace a document
    async fn put(&self, table: &str, id: &str, document: Value) -> Result<()>;

    /// Remove a document, returning whether it existed
    async fn delete(&self, table: &str, id: &str) -> Result<bool>;

    /// Documents whose top-level attributes equal every filter value
    ///
    /// Non-string attributes compare by their JSON text (`true`, `42`).
    /// Missing or null attributes never match.
    async fn query(&self, table: &str, filters: &[AttributeFilter<'_>]) -> Result<Vec<Value>>;

    /// Every document in a table
    async fn scan(&self, table: &str) -> Result<Vec<Value>>;
}

/// Whether a document satisfies every attribute filter
///
/// Shared by in-process implementations so that they agree with the
/// `->>` text comparison used by the PostgreSQL store.
pub fn matches_filters(document: &Value, filters: &[AttributeFilter<'_>]) -> bool {
    filters.iter().all(|(attribute, expected)| {
        match document.get(*attribute) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == *expected,
        }
    })
}
