//! PostgreSQL implementation of the document store
//!
//! All tables share the `documents` relation keyed by `(collection, id)`.

use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::store::traits::{AttributeFilter, DocumentStore};
use crate::domain::{Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// Document store over a single JSONB table
pub struct PostgreSQLStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLStore {
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

/// Builds the attribute query; parameter 1 is the collection, then one
/// `(attribute, value)` pair per filter
pub(crate) fn build_query_sql(filter_count: usize) -> String {
    let mut sql = String::from("SELECT body FROM documents WHERE collection = $1");
    for i in 0..filter_count {
        let attr = 2 + i * 2;
        sql.push_str(&format!(" AND body ->> ${attr} = ${}", attr + 1));
    }
    sql.push_str(" ORDER BY id");
    sql
}

#[async_trait]
impl DocumentStore for PostgreSQLStore {
    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>> {
        let rows = self
            .client
            .query(
                "SELECT body FROM documents WHERE collection = $1 AND id = $2",
                &[&table, &id],
            )
            .await?;
        Ok(rows.first().map(|row| row.get::<_, Value>(0)))
    }

    async fn insert(&self, table: &str, id: &str, document: Value) -> Result<()> {
        let inserted = self
            .client
            .execute(
                "INSERT INTO documents (collection, id, body, updated_at) \
                 VALUES ($1, $2, $3, NOW()) \
                 ON CONFLICT (collection, id) DO NOTHING",
                &[&table, &id, &document],
            )
            .await?;

        if inserted == 0 {
            return Err(StoreError::AlreadyExists {
                table: table.to_string(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn put(&self, table: &str, id: &str, document: Value) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO documents (collection, id, body, updated_at) \
                 VALUES ($1, $2, $3, NOW()) \
                 ON CONFLICT (collection, id) \
                 DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()",
                &[&table, &id, &document],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool> {
        let deleted = self
            .client
            .execute(
                "DELETE FROM documents WHERE collection = $1 AND id = $2",
                &[&table, &id],
            )
            .await?;
        Ok(deleted > 0)
    }

    async fn query(&self, table: &str, filters: &[AttributeFilter<'_>]) -> Result<Vec<Value>> {
        let sql = build_query_sql(filters.len());

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(1 + filters.len() * 2);
        params.push(&table);
        for (attribute, value) in filters {
            params.push(attribute);
            params.push(value);
        }

        let rows = self.client.query(&sql, &params).await?;
        Ok(rows.iter().map(|row| row.get::<_, Value>(0)).collect())
    }

    async fn scan(&self, table: &str) -> Result<Vec<Value>> {
        let rows = self
            .client
            .query(
                "SELECT body FROM documents WHERE collection = $1 ORDER BY id",
                &[&table],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get::<_, Value>(0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_sql_without_filters() {
        assert_eq!(
            build_query_sql(0),
            "SELECT body FROM documents WHERE collection = $1 ORDER BY id"
        );
    }

    #[test]
    fn test_build_query_sql_numbers_parameters() {
        assert_eq!(
            build_query_sql(2),
            "SELECT body FROM documents WHERE collection = $1 \
             AND body ->> $2 = $3 AND body ->> $4 = $5 ORDER BY id"
        );
    }
}
