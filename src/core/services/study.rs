//! Study protocol management

use super::audit::AuditService;
use super::organization::link;
use crate::adapters::store::Repositories;
use crate::core::access::{Permission, Principal};
use crate::domain::study::validate_visit_templates;
use crate::domain::{
    AuditEvent, AuditEventType, ChangeSet, ClinicalStudy, OrganizationId, Result, StudyId,
    StudyPhase, StudyStatus, TrialError, VisitTemplate,
};
use chrono::{NaiveDate, Utc};

/// Input for [`StudyService::create`]
#[derive(Debug, Clone)]
pub struct NewStudy {
    pub code: String,
    pub title: String,
    pub protocol_version: String,
    pub description: Option<String>,
    pub phase: StudyPhase,
    pub target_enrollment: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub visit_templates: Vec<VisitTemplate>,
}

impl NewStudy {
    pub fn new(
        code: impl Into<String>,
        title: impl Into<String>,
        visit_templates: Vec<VisitTemplate>,
    ) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            protocol_version: "1.0".to_string(),
            description: None,
            phase: StudyPhase::default(),
            target_enrollment: 0,
            start_date: None,
            end_date: None,
            visit_templates,
        }
    }
}

#[derive(Clone)]
pub struct StudyService {
    repos: Repositories,
    audit: AuditService,
}

impl StudyService {
    pub fn new(repos: Repositories, audit: AuditService) -> Self {
        Self { repos, audit }
    }

    /// Creates a draft study
    ///
    /// # Errors
    ///
    /// Returns [`TrialError::Validation`] for a malformed protocol and
    /// [`TrialError::Conflict`] when the code is taken.
    pub async fn create(&self, principal: &Principal, new: NewStudy) -> Result<ClinicalStudy> {
        self.audit
            .check(principal, Permission::WriteStudy, None, "study")
            .await?;

        let mut study = ClinicalStudy::new(
            new.code,
            new.title,
            new.protocol_version,
            new.visit_templates,
        )
        .map_err(TrialError::Validation)?;

        if let (Some(start), Some(end)) = (new.start_date, new.end_date) {
            if end < start {
                return Err(TrialError::Validation(format!(
                    "study end date {end} is before its start date {start}"
                )));
            }
        }
        study.description = new.description;
        study.phase = new.phase;
        study.target_enrollment = new.target_enrollment;
        study.start_date = new.start_date;
        study.end_date = new.end_date;

        if !self
            .repos
            .studies
            .find_by(&[("code", study.code.as_str())])
            .await?
            .is_empty()
        {
            return Err(TrialError::Conflict(format!(
                "study code {} is already in use",
                study.code
            )));
        }

        self.repos.studies.insert(&study).await?;

        tracing::info!(
            study_id = %study.id,
            code = %study.code,
            visits = study.visit_templates.len(),
            "Study created"
        );

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::StudyCreated,
                    "study",
                    format!("Created study {}", study.code),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&study.id)
                .study(study.id.clone()),
            )
            .await?;

        Ok(study)
    }

    pub async fn get(&self, principal: &Principal, id: &StudyId) -> Result<ClinicalStudy> {
        self.audit
            .check(principal, Permission::ReadStudy, None, "study")
            .await?;
        self.repos.studies.require(id.as_str()).await
    }

    /// Every study for super admins, those targeting the caller's site otherwise
    pub async fn list(&self, principal: &Principal) -> Result<Vec<ClinicalStudy>> {
        self.audit
            .check(principal, Permission::ReadStudy, None, "study")
            .await?;

        let mut studies = self.repos.studies.list().await?;
        if !principal.is_super_admin() {
            studies.retain(|study| {
                principal
                    .organization_id
                    .as_ref()
                    .is_some_and(|own| study.targets(own))
            });
        }
        studies.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(studies)
    }

    /// Replaces the protocol of a draft study
    ///
    /// # Errors
    ///
    /// Returns [`TrialError::Conflict`] once the study has left draft.
    pub async fn update_visit_templates(
        &self,
        principal: &Principal,
        id: &StudyId,
        templates: Vec<VisitTemplate>,
    ) -> Result<ClinicalStudy> {
        self.audit
            .check(principal, Permission::WriteStudy, None, "study")
            .await?;

        let mut study = self.repos.studies.require(id.as_str()).await?;
        if study.status != StudyStatus::Draft {
            return Err(TrialError::Conflict(format!(
                "visit templates of study {} are frozen once it leaves draft",
                study.code
            )));
        }
        validate_visit_templates(&templates).map_err(TrialError::Validation)?;

        let mut changes = ChangeSet::new();
        changes.track("visit_templates", &study.visit_templates, &templates);
        study.visit_templates = templates;
        study.updated_at = Utc::now();
        self.repos.studies.save(&study).await?;
        self.log_updated(principal, &study, changes, "Updated visit templates")
            .await?;

        Ok(study)
    }

    pub async fn set_status(
        &self,
        principal: &Principal,
        id: &StudyId,
        status: StudyStatus,
    ) -> Result<ClinicalStudy> {
        self.audit
            .check(principal, Permission::WriteStudy, None, "study")
            .await?;

        let mut study = self.repos.studies.require(id.as_str()).await?;
        if study.status == status {
            return Ok(study);
        }

        let mut changes = ChangeSet::new();
        changes.track("status", &study.status, &status);
        study.status = status;
        study.updated_at = Utc::now();
        self.repos.studies.save(&study).await?;

        tracing::info!(study_id = %study.id, status = ?status, "Study status changed");

        self.log_updated(principal, &study, changes, "Changed study status")
            .await?;
        Ok(study)
    }

    /// Opens the study to a site, recording the link on both entities
    pub async fn add_target_organization(
        &self,
        principal: &Principal,
        id: &StudyId,
        organization_id: &OrganizationId,
    ) -> Result<ClinicalStudy> {
        self.audit
            .check(principal, Permission::WriteStudy, None, "study")
            .await?;

        let mut study = self.repos.studies.require(id.as_str()).await?;
        let mut organization = self
            .repos
            .organizations
            .require(organization_id.as_str())
            .await?;

        let before = study.target_organization_ids.clone();
        if link(&mut organization, &mut study) {
            self.repos.studies.save(&study).await?;
            self.repos.organizations.save(&organization).await?;

            let mut changes = ChangeSet::new();
            changes.track(
                "target_organization_ids",
                &before,
                &study.target_organization_ids,
            );
            self.log_updated(
                principal,
                &study,
                changes,
                &format!("Added target organization {}", organization.code),
            )
            .await?;
        }

        Ok(study)
    }

    async fn log_updated(
        &self,
        principal: &Principal,
        study: &ClinicalStudy,
        changes: ChangeSet,
        description: &str,
    ) -> Result<()> {
        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::StudyUpdated,
                    "study",
                    format!("{description}: {}", study.code),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&study.id)
                .changes(changes.into_changes())
                .study(study.id.clone()),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::adapters::store::Repository;
    use crate::domain::{Organization, OrganizationType, Role};
    use std::sync::Arc;

    fn service() -> StudyService {
        let repos = Repositories::new(Arc::new(MemoryStore::new()));
        let audit = AuditService::new(Repository::new(Arc::clone(&repos.store)), true);
        StudyService::new(repos, audit)
    }

    fn templates() -> Vec<VisitTemplate> {
        vec![
            VisitTemplate::new(1, "Baseline", 0),
            VisitTemplate::new(2, "Week 4", 28).with_window(3, 3),
        ]
    }

    #[tokio::test]
    async fn test_create_validates_and_rejects_duplicates() {
        let studies = service();
        let admin = Principal::system();

        let bad = NewStudy::new("ONC", "Oncology", Vec::new());
        assert!(matches!(
            studies.create(&admin, bad).await,
            Err(TrialError::Validation(_))
        ));

        studies
            .create(&admin, NewStudy::new("ONC", "Oncology", templates()))
            .await
            .unwrap();
        assert!(matches!(
            studies
                .create(&admin, NewStudy::new("onc", "Again", templates()))
                .await,
            Err(TrialError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_templates_frozen_after_draft() {
        let studies = service();
        let admin = Principal::system();
        let study = studies
            .create(&admin, NewStudy::new("ONC", "Oncology", templates()))
            .await
            .unwrap();

        studies
            .update_visit_templates(&admin, &study.id, vec![VisitTemplate::new(1, "Only", 0)])
            .await
            .unwrap();
        studies
            .set_status(&admin, &study.id, StudyStatus::Active)
            .await
            .unwrap();

        assert!(matches!(
            studies
                .update_visit_templates(&admin, &study.id, templates())
                .await,
            Err(TrialError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_list_scoped_to_targeted_studies() {
        let studies = service();
        let admin = Principal::system();
        let org = Organization::builder()
            .name("Site")
            .code("UH-01")
            .organization_type(OrganizationType::Hospital)
            .build()
            .unwrap();
        studies.repos.organizations.insert(&org).await.unwrap();

        let targeted = studies
            .create(&admin, NewStudy::new("ONC", "Oncology", templates()))
            .await
            .unwrap();
        studies
            .create(&admin, NewStudy::new("CAR", "Cardiology", templates()))
            .await
            .unwrap();
        studies
            .add_target_organization(&admin, &targeted.id, &org.id)
            .await
            .unwrap();

        let investigator = Principal::new(None, "pi", Role::Investigator, Some(org.id.clone()));
        let visible = studies.list(&investigator).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].code, "ONC");

        assert!(matches!(
            studies
                .create(&investigator, NewStudy::new("NEW", "New", templates()))
                .await,
            Err(TrialError::Forbidden(_))
        ));
    }
}
