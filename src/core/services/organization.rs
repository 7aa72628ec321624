//! Trial site management

use super::audit::AuditService;
use crate::adapters::store::Repositories;
use crate::core::access::{Permission, Principal};
use crate::domain::{
    Address, AuditEvent, AuditEventType, ChangeSet, ClinicalStudy, Organization, OrganizationId,
    OrganizationStatus, OrganizationType, Result, StudyId, TrialError,
};
use chrono::Utc;

/// Fields an update may change; `None` leaves the field as is
#[derive(Debug, Clone, Default)]
pub struct OrganizationUpdate {
    pub name: Option<String>,
    pub organization_type: Option<OrganizationType>,
    pub address: Option<Address>,
    pub capacity: Option<u32>,
    pub equipment: Option<Vec<String>>,
    pub certifications: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct OrganizationService {
    repos: Repositories,
    audit: AuditService,
}

impl OrganizationService {
    pub fn new(repos: Repositories, audit: AuditService) -> Self {
        Self { repos, audit }
    }

    /// Stores a new organization
    ///
    /// # Errors
    ///
    /// Returns [`TrialError::Conflict`] when another organization already uses
    /// the same code.
    pub async fn create(
        &self,
        principal: &Principal,
        organization: Organization,
    ) -> Result<Organization> {
        self.audit
            .check(
                principal,
                Permission::WriteOrganization,
                Some(&organization.id),
                "organization",
            )
            .await?;

        if !self
            .repos
            .organizations
            .find_by(&[("code", organization.code.as_str())])
            .await?
            .is_empty()
        {
            return Err(TrialError::Conflict(format!(
                "organization code {} is already in use",
                organization.code
            )));
        }

        self.repos.organizations.insert(&organization).await?;

        tracing::info!(
            organization_id = %organization.id,
            code = %organization.code,
            "Organization created"
        );

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::OrganizationCreated,
                    "organization",
                    format!("Created organization {}", organization.code),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&organization.id)
                .organization(Some(organization.id.clone())),
            )
            .await?;

        Ok(organization)
    }

    pub async fn get(&self, principal: &Principal, id: &OrganizationId) -> Result<Organization> {
        self.audit
            .check(principal, Permission::ReadOrganization, Some(id), "organization")
            .await?;
        self.repos.organizations.require(id.as_str()).await
    }

    /// Every organization for super admins, the caller's own otherwise
    pub async fn list(&self, principal: &Principal) -> Result<Vec<Organization>> {
        self.audit
            .check(principal, Permission::ReadOrganization, None, "organization")
            .await?;

        let mut organizations = if principal.is_super_admin() {
            self.repos.organizations.list().await?
        } else {
            match principal.organization_id {
                Some(ref own) => self
                    .repos
                    .organizations
                    .get(own.as_str())
                    .await?
                    .into_iter()
                    .collect(),
                None => Vec::new(),
            }
        };
        organizations.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(organizations)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: &OrganizationId,
        update: OrganizationUpdate,
    ) -> Result<Organization> {
        self.audit
            .check(principal, Permission::WriteOrganization, Some(id), "organization")
            .await?;

        let mut organization = self.repos.organizations.require(id.as_str()).await?;
        let mut changes = ChangeSet::new();

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(TrialError::Validation("name cannot be empty".to_string()));
            }
            changes.track("name", &organization.name, &name);
            organization.name = name;
        }
        if let Some(organization_type) = update.organization_type {
            changes.track(
                "organization_type",
                &organization.organization_type,
                &organization_type,
            );
            organization.organization_type = organization_type;
        }
        if let Some(address) = update.address {
            let address = Some(address);
            changes.track("address", &organization.address, &address);
            organization.address = address;
        }
        if let Some(capacity) = update.capacity {
            changes.track("capacity", &organization.capacity, &capacity);
            organization.capacity = capacity;
        }
        if let Some(equipment) = update.equipment {
            changes.track("equipment", &organization.equipment, &equipment);
            organization.equipment = equipment;
        }
        if let Some(certifications) = update.certifications {
            changes.track("certifications", &organization.certifications, &certifications);
            organization.certifications = certifications;
        }

        if changes.is_empty() {
            return Ok(organization);
        }

        organization.updated_at = Utc::now();
        self.repos.organizations.save(&organization).await?;
        self.log_updated(principal, &organization, changes, "Updated organization")
            .await?;

        Ok(organization)
    }

    pub async fn set_status(
        &self,
        principal: &Principal,
        id: &OrganizationId,
        status: OrganizationStatus,
    ) -> Result<Organization> {
        self.audit
            .check(principal, Permission::WriteOrganization, Some(id), "organization")
            .await?;

        let mut organization = self.repos.organizations.require(id.as_str()).await?;
        if organization.status == status {
            return Ok(organization);
        }

        let mut changes = ChangeSet::new();
        changes.track("status", &organization.status, &status);
        organization.status = status;
        organization.updated_at = Utc::now();
        self.repos.organizations.save(&organization).await?;
        self.log_updated(principal, &organization, changes, "Changed organization status")
            .await?;

        Ok(organization)
    }

    /// Records that the organization takes part in a study, on both sides
    pub async fn link_study(
        &self,
        principal: &Principal,
        id: &OrganizationId,
        study_id: &StudyId,
    ) -> Result<Organization> {
        self.audit
            .check(principal, Permission::WriteOrganization, Some(id), "organization")
            .await?;

        let mut organization = self.repos.organizations.require(id.as_str()).await?;
        let mut study = self.repos.studies.require(study_id.as_str()).await?;

        if link(&mut organization, &mut study) {
            self.repos.organizations.save(&organization).await?;
            self.repos.studies.save(&study).await?;

            let mut changes = ChangeSet::new();
            changes.track("study_ids", &Vec::<StudyId>::new(), &vec![study_id.clone()]);
            self.log_updated(
                principal,
                &organization,
                changes,
                &format!("Linked study {}", study.code),
            )
            .await?;
        }

        Ok(organization)
    }

    pub async fn unlink_study(
        &self,
        principal: &Principal,
        id: &OrganizationId,
        study_id: &StudyId,
    ) -> Result<Organization> {
        self.audit
            .check(principal, Permission::WriteOrganization, Some(id), "organization")
            .await?;

        let mut organization = self.repos.organizations.require(id.as_str()).await?;
        if !organization.participates_in(study_id) {
            return Ok(organization);
        }

        organization.study_ids.retain(|s| s != study_id);
        organization.updated_at = Utc::now();
        self.repos.organizations.save(&organization).await?;

        if let Some(mut study) = self.repos.studies.get(study_id.as_str()).await? {
            study.target_organization_ids.retain(|o| o != id);
            study.updated_at = Utc::now();
            self.repos.studies.save(&study).await?;
        }

        let mut changes = ChangeSet::new();
        changes.track("study_ids", &vec![study_id.clone()], &Vec::<StudyId>::new());
        self.log_updated(
            principal,
            &organization,
            changes,
            &format!("Unlinked study {study_id}"),
        )
        .await?;

        Ok(organization)
    }

    /// Deletes an organization without patients
    ///
    /// # Errors
    ///
    /// Returns [`TrialError::Conflict`] while any patient still belongs to it.
    pub async fn delete(&self, principal: &Principal, id: &OrganizationId) -> Result<()> {
        self.audit
            .check(principal, Permission::DeleteOrganization, Some(id), "organization")
            .await?;

        let organization = self.repos.organizations.require(id.as_str()).await?;
        let patients = self
            .repos
            .patients
            .find_by(&[("organization_id", id.as_str())])
            .await?;
        if !patients.is_empty() {
            return Err(TrialError::Conflict(format!(
                "organization {} still has {} patient(s)",
                organization.code,
                patients.len()
            )));
        }

        self.repos.organizations.delete(id.as_str()).await?;

        tracing::info!(organization_id = %id, code = %organization.code, "Organization deleted");

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::OrganizationDeleted,
                    "organization",
                    format!("Deleted organization {}", organization.code),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(id)
                .organization(Some(id.clone())),
            )
            .await?;

        Ok(())
    }

    async fn log_updated(
        &self,
        principal: &Principal,
        organization: &Organization,
        changes: ChangeSet,
        description: &str,
    ) -> Result<()> {
        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::OrganizationUpdated,
                    "organization",
                    format!("{description}: {}", organization.code),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&organization.id)
                .changes(changes.into_changes())
                .organization(Some(organization.id.clone())),
            )
            .await?;
        Ok(())
    }
}

/// Adds each side to the other; returns whether anything changed
pub(crate) fn link(organization: &mut Organization, study: &mut ClinicalStudy) -> bool {
    let mut changed = false;
    if !organization.participates_in(&study.id) {
        organization.study_ids.push(study.id.clone());
        organization.updated_at = Utc::now();
        changed = true;
    }
    if !study.targets(&organization.id) {
        study.target_organization_ids.push(organization.id.clone());
        study.updated_at = Utc::now();
        changed = true;
    }
    changed
}
