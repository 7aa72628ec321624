//! In-process document store

use crate::adapters::store::traits::{matches_filters, AttributeFilter, DocumentStore};
use crate::domain::{Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

type Tables = HashMap<String, BTreeMap<String, Value>>;

/// Document store held entirely in memory
///
/// Tables are created on first write. Scans return documents ordered by id.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a table
    pub async fn count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .and_then(|t| t.get(id))
            .cloned())
    }

    async fn insert(&self, table: &str, id: &str, document: Value) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(id) {
            return Err(StoreError::AlreadyExists {
                table: table.to_string(),
                id: id.to_string(),
            }
            .into());
        }
        rows.insert(id.to_string(), document);
        Ok(())
    }

    async fn put(&self, table: &str, id: &str, document: Value) -> Result<()> {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .get_mut(table)
            .and_then(|t| t.remove(id))
            .is_some())
    }

    async fn query(&self, table: &str, filters: &[AttributeFilter<'_>]) -> Result<Vec<Value>> {
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|doc| matches_filters(doc, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scan(&self, table: &str) -> Result<Vec<Value>> {
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrialError;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_is_create_only() {
        let store = MemoryStore::new();
        store.insert("t", "1", json!({"a": 1})).await.unwrap();
        let err = store.insert("t", "1", json!({"a": 2})).await.unwrap_err();
        assert!(matches!(
            err,
            TrialError::Store(StoreError::AlreadyExists { .. })
        ));
        assert_eq!(store.get("t", "1").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_put_upserts() {
        let store = MemoryStore::new();
        store.put("t", "1", json!({"a": 1})).await.unwrap();
        store.put("t", "1", json!({"a": 2})).await.unwrap();
        assert_eq!(store.get("t", "1").await.unwrap(), Some(json!({"a": 2})));
        assert_eq!(store.count("t").await, 1);
    }

    #[tokio::test]
    async fn test_query_and_scan() {
        let store = MemoryStore::new();
        store
            .put("visits", "b", json!({"survey_id": "s1", "status": "scheduled"}))
            .await
            .unwrap();
        store
            .put("visits", "a", json!({"survey_id": "s1", "status": "completed"}))
            .await
            .unwrap();
        store
            .put("visits", "c", json!({"survey_id": "s2", "status": "scheduled"}))
            .await
            .unwrap();

        let s1 = store.query("visits", &[("survey_id", "s1")]).await.unwrap();
        assert_eq!(s1.len(), 2);

        let open = store
            .query("visits", &[("survey_id", "s1"), ("status", "scheduled")])
            .await
            .unwrap();
        assert_eq!(open.len(), 1);

        assert_eq!(store.scan("visits").await.unwrap().len(), 3);
        assert!(store.scan("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = MemoryStore::new();
        store.put("t", "1", json!({})).await.unwrap();
        assert!(store.delete("t", "1").await.unwrap());
        assert!(!store.delete("t", "1").await.unwrap());
        assert!(!store.delete("missing", "1").await.unwrap());
    }
}
