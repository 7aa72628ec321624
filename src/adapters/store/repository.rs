//! Typed repositories over a [`DocumentStore`]

use super::traits::{AttributeFilter, DocumentStore};
use crate::domain::{
    AuditLogRecord, ClinicalStudy, Organization, Patient, Result, StoreError, Survey, TrialError,
    User, Visit,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type persisted as one document per key in a named table
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Table holding documents of this type
    const TABLE: &'static str;

    /// Human-readable entity name used in errors
    const NAME: &'static str;

    /// Document key
    fn key(&self) -> String;
}

impl Entity for Organization {
    const TABLE: &'static str = "organizations";
    const NAME: &'static str = "Organization";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for Patient {
    const TABLE: &'static str = "patients";
    const NAME: &'static str = "Patient";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for ClinicalStudy {
    const TABLE: &'static str = "studies";
    const NAME: &'static str = "Study";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for Survey {
    const TABLE: &'static str = "surveys";
    const NAME: &'static str = "Survey";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for Visit {
    const TABLE: &'static str = "visits";
    const NAME: &'static str = "Visit";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const NAME: &'static str = "User";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for AuditLogRecord {
    const TABLE: &'static str = "audit_logs";
    const NAME: &'static str = "Audit log";

    fn key(&self) -> String {
        self.log_id.to_string()
    }
}

/// Typed access to one table
pub struct Repository<T: Entity> {
    store: Arc<dyn DocumentStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        match self.store.get(T::TABLE, id).await? {
            Some(document) => Ok(Some(decode(document)?)),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get) but a missing document is `NotFound`
    pub async fn require(&self, id: &str) -> Result<T> {
        self.get(id)
            .await?
            .ok_or_else(|| TrialError::not_found(T::NAME, id))
    }

    /// Create-only write; an existing key is a `Conflict`
    pub async fn insert(&self, entity: &T) -> Result<()> {
        let key = entity.key();
        match self.store.insert(T::TABLE, &key, encode(entity)?).await {
            Err(TrialError::Store(StoreError::AlreadyExists { .. })) => Err(TrialError::Conflict(
                format!("{} {} already exists", T::NAME, key),
            )),
            other => other,
        }
    }

    /// Create or replace
    pub async fn save(&self, entity: &T) -> Result<()> {
        self.store
            .put(T::TABLE, &entity.key(), encode(entity)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.store.delete(T::TABLE, id).await
    }

    pub async fn find_by(&self, filters: &[AttributeFilter<'_>]) -> Result<Vec<T>> {
        self.store
            .query(T::TABLE, filters)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn list(&self) -> Result<Vec<T>> {
        self.store
            .scan(T::TABLE)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }
}

fn encode<T: Entity>(entity: &T) -> Result<serde_json::Value> {
    serde_json::to_value(entity).map_err(|e| {
        TrialError::Store(StoreError::WriteFailed(format!(
            "Failed to encode {}: {e}",
            T::NAME
        )))
    })
}

fn decode<T: Entity>(document: serde_json::Value) -> Result<T> {
    serde_json::from_value(document).map_err(|e| {
        TrialError::Store(StoreError::DeserializationFailed(format!(
            "{} document in '{}': {e}",
            T::NAME,
            T::TABLE
        )))
    })
}

/// One repository per table, sharing a store
#[derive(Clone)]
pub struct Repositories {
    pub store: Arc<dyn DocumentStore>,
    pub organizations: Repository<Organization>,
    pub patients: Repository<Patient>,
    pub studies: Repository<ClinicalStudy>,
    pub surveys: Repository<Survey>,
    pub visits: Repository<Visit>,
    pub users: Repository<User>,
    pub audit_logs: Repository<AuditLogRecord>,
}

impl Repositories {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            organizations: Repository::new(Arc::clone(&store)),
            patients: Repository::new(Arc::clone(&store)),
            studies: Repository::new(Arc::clone(&store)),
            surveys: Repository::new(Arc::clone(&store)),
            visits: Repository::new(Arc::clone(&store)),
            users: Repository::new(Arc::clone(&store)),
            audit_logs: Repository::new(Arc::clone(&store)),
            store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::{OrganizationId, Patient};

    fn patients() -> Repository<Patient> {
        Repository::new(Arc::new(MemoryStore::new()))
    }

    fn patient(code: &str) -> Patient {
        Patient::new(OrganizationId::new("org-1").unwrap(), code).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_require() {
        let repo = patients();
        let p = patient("P-001");
        repo.insert(&p).await.unwrap();

        let loaded = repo.require(p.id.as_str()).await.unwrap();
        assert_eq!(loaded.patient_code, "P-001");
    }

    #[tokio::test]
    async fn test_insert_duplicate_is_conflict() {
        let repo = patients();
        let p = patient("P-001");
        repo.insert(&p).await.unwrap();
        assert!(matches!(repo.insert(&p).await, Err(TrialError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_require_missing_is_not_found() {
        let repo = patients();
        let err = repo.require("nope").await.unwrap_err();
        assert!(matches!(err, TrialError::NotFound { entity: "Patient", .. }));
    }

    #[tokio::test]
    async fn test_find_by_attribute() {
        let repo = patients();
        repo.insert(&patient("P-001")).await.unwrap();
        repo.insert(&patient("P-002")).await.unwrap();

        let found = repo.find_by(&[("patient_code", "P-002")]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].patient_code, "P-002");
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_overwrites_and_delete() {
        let repo = patients();
        let mut p = patient("P-001");
        repo.insert(&p).await.unwrap();

        p.initials = Some("AB".to_string());
        repo.save(&p).await.unwrap();
        assert_eq!(
            repo.require(p.id.as_str()).await.unwrap().initials.as_deref(),
            Some("AB")
        );

        assert!(repo.delete(p.id.as_str()).await.unwrap());
        assert!(!repo.delete(p.id.as_str()).await.unwrap());
    }
}
