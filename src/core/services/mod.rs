//! Business operations over the stored entities
//!
//! Each service authorizes the calling [`Principal`](crate::core::access::Principal),
//! applies its business rules through the typed repositories and records an
//! audit event for every change. [`Services`] wires them all to one store and
//! one identity provider.

pub mod audit;
pub mod auth;
pub mod organization;
pub mod patient;
pub mod study;
pub mod survey;
pub mod user;
pub mod visit;

pub use audit::{AuditFilter, AuditService, RetentionSweepSummary};
pub use auth::{AuthService, Session};
pub use organization::{OrganizationService, OrganizationUpdate};
pub use patient::{NewPatient, PatientService, PatientUpdate};
pub use study::{NewStudy, StudyService};
pub use survey::SurveyService;
pub use user::{CreatedUser, NewUser, UserService};
pub use visit::{VisitCompletion, VisitService};

use crate::adapters::identity::IdentityProvider;
use crate::adapters::store::{DocumentStore, Repositories};
use crate::config::TrialsiteConfig;
use crate::core::scheduling::DeviationPolicy;
use serde::Serialize;
use std::sync::Arc;

/// All services sharing one store and identity provider
#[derive(Clone)]
pub struct Services {
    pub audit: AuditService,
    pub organizations: OrganizationService,
    pub patients: PatientService,
    pub studies: StudyService,
    pub surveys: SurveyService,
    pub visits: VisitService,
    pub users: UserService,
    pub auth: AuthService,
}

impl Services {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &TrialsiteConfig,
    ) -> Self {
        let repos = Repositories::new(store);
        let audit = AuditService::new(repos.audit_logs.clone(), config.audit.enabled);
        let policy = DeviationPolicy::from(&config.scheduling);

        let surveys = SurveyService::new(repos.clone(), audit.clone());
        let visits = VisitService::new(repos.clone(), audit.clone(), surveys.clone(), policy);

        tracing::debug!(
            store = repos.store.backend_name(),
            identity = identity.provider_name(),
            audit_enabled = config.audit.enabled,
            "Services initialized"
        );

        Self {
            organizations: OrganizationService::new(repos.clone(), audit.clone()),
            patients: PatientService::new(repos.clone(), audit.clone()),
            studies: StudyService::new(repos.clone(), audit.clone()),
            users: UserService::new(repos.clone(), audit.clone(), Arc::clone(&identity)),
            auth: AuthService::new(repos, audit.clone(), identity),
            surveys,
            visits,
            audit,
        }
    }
}

/// Stored text of a unit enum variant, for attribute queries
pub(crate) fn stored_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => name,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PatientStatus, VisitStatus};

    #[test]
    fn test_stored_name_matches_serde() {
        assert_eq!(stored_name(&VisitStatus::InProgress), "in_progress");
        assert_eq!(stored_name(&PatientStatus::Screening), "screening");
    }
}
