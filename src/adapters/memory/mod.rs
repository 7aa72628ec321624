//! In-memory document store for development and tests

pub mod store;

pub use store::MemoryStore;
