//! PostgreSQL document store
//!
//! This module stores every trialsite table as JSONB rows in PostgreSQL.

pub mod client;
pub mod store;

pub use client::PostgreSQLClient;
pub use store::PostgreSQLStore;
