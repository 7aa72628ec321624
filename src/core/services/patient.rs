//! Patient registry per site

use super::audit::AuditService;
use super::stored_name;
use crate::adapters::store::Repositories;
use crate::core::access::{Permission, Principal};
use crate::domain::{
    AuditEvent, AuditEventType, ChangeSet, OrganizationId, Patient, PatientId, PatientStatus,
    Result, Sex, SurveyStatus, TrialError,
};
use chrono::Utc;

/// Input for [`PatientService::create`]
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub organization_id: OrganizationId,
    pub patient_code: String,
    pub initials: Option<String>,
    pub birth_year: Option<i32>,
    pub sex: Option<Sex>,
}

impl NewPatient {
    pub fn new(organization_id: OrganizationId, patient_code: impl Into<String>) -> Self {
        Self {
            organization_id,
            patient_code: patient_code.into(),
            initials: None,
            birth_year: None,
            sex: None,
        }
    }
}

/// Demographic fields an update may change
#[derive(Debug, Clone, Default)]
pub struct PatientUpdate {
    pub initials: Option<String>,
    pub birth_year: Option<i32>,
    pub sex: Option<Sex>,
}

#[derive(Clone)]
pub struct PatientService {
    repos: Repositories,
    audit: AuditService,
}

impl PatientService {
    pub fn new(repos: Repositories, audit: AuditService) -> Self {
        Self { repos, audit }
    }

    /// Registers a patient in screening status
    ///
    /// # Errors
    ///
    /// Returns [`TrialError::Conflict`] when the patient code is already used
    /// within the organization, or [`TrialError::NotFound`] for an unknown
    /// organization.
    pub async fn create(&self, principal: &Principal, new: NewPatient) -> Result<Patient> {
        self.audit
            .check(
                principal,
                Permission::WritePatient,
                Some(&new.organization_id),
                "patient",
            )
            .await?;

        self.repos
            .organizations
            .require(new.organization_id.as_str())
            .await?;

        let mut patient =
            Patient::new(new.organization_id, new.patient_code).map_err(TrialError::Validation)?;
        validate_birth_year(new.birth_year)?;
        patient.initials = new.initials;
        patient.birth_year = new.birth_year;
        patient.sex = new.sex;

        let existing = self
            .repos
            .patients
            .find_by(&[
                ("organization_id", patient.organization_id.as_str()),
                ("patient_code", patient.patient_code.as_str()),
            ])
            .await?;
        if !existing.is_empty() {
            return Err(TrialError::Conflict(format!(
                "patient code {} already exists in organization {}",
                patient.patient_code, patient.organization_id
            )));
        }

        self.repos.patients.insert(&patient).await?;

        tracing::info!(
            patient_id = %patient.id,
            organization_id = %patient.organization_id,
            "Patient registered"
        );

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::PatientCreated,
                    "patient",
                    format!("Registered patient {}", patient.patient_code),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&patient.id)
                .organization(Some(patient.organization_id.clone()))
                .patient(patient.id.clone()),
            )
            .await?;

        Ok(patient)
    }

    pub async fn get(&self, principal: &Principal, id: &PatientId) -> Result<Patient> {
        let patient = self.repos.patients.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::ReadPatient,
                Some(&patient.organization_id),
                "patient",
            )
            .await?;
        Ok(patient)
    }

    /// Patients of one site ordered by code, optionally only those in `status`
    pub async fn list_by_organization(
        &self,
        principal: &Principal,
        organization_id: &OrganizationId,
        status: Option<PatientStatus>,
    ) -> Result<Vec<Patient>> {
        self.audit
            .check(
                principal,
                Permission::ReadPatient,
                Some(organization_id),
                "patient",
            )
            .await?;

        let mut patients = match status {
            Some(status) => {
                let status = stored_name(&status);
                self.repos
                    .patients
                    .find_by(&[
                        ("organization_id", organization_id.as_str()),
                        ("status", status.as_str()),
                    ])
                    .await?
            }
            None => {
                self.repos
                    .patients
                    .find_by(&[("organization_id", organization_id.as_str())])
                    .await?
            }
        };
        patients.sort_by(|a, b| a.patient_code.cmp(&b.patient_code));
        Ok(patients)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: &PatientId,
        update: PatientUpdate,
    ) -> Result<Patient> {
        let mut patient = self.repos.patients.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::WritePatient,
                Some(&patient.organization_id),
                "patient",
            )
            .await?;

        let mut changes = ChangeSet::new();
        if let Some(initials) = update.initials {
            let initials = Some(initials);
            changes.track("initials", &patient.initials, &initials);
            patient.initials = initials;
        }
        if let Some(birth_year) = update.birth_year {
            validate_birth_year(Some(birth_year))?;
            let birth_year = Some(birth_year);
            changes.track("birth_year", &patient.birth_year, &birth_year);
            patient.birth_year = birth_year;
        }
        if let Some(sex) = update.sex {
            let sex = Some(sex);
            changes.track("sex", &patient.sex, &sex);
            patient.sex = sex;
        }

        if changes.is_empty() {
            return Ok(patient);
        }

        patient.updated_at = Utc::now();
        self.repos.patients.save(&patient).await?;
        self.log_updated(principal, &patient, changes).await?;
        Ok(patient)
    }

    pub async fn set_status(
        &self,
        principal: &Principal,
        id: &PatientId,
        status: PatientStatus,
    ) -> Result<Patient> {
        let mut patient = self.repos.patients.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::WritePatient,
                Some(&patient.organization_id),
                "patient",
            )
            .await?;

        if patient.status == status {
            return Ok(patient);
        }

        let mut changes = ChangeSet::new();
        changes.track("status", &patient.status, &status);
        patient.status = status;
        patient.updated_at = Utc::now();
        self.repos.patients.save(&patient).await?;
        self.log_updated(principal, &patient, changes).await?;
        Ok(patient)
    }

    /// Deletes a patient without an active survey
    pub async fn delete(&self, principal: &Principal, id: &PatientId) -> Result<()> {
        let patient = self.repos.patients.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::DeletePatient,
                Some(&patient.organization_id),
                "patient",
            )
            .await?;

        let active = stored_name(&SurveyStatus::Active);
        let surveys = self
            .repos
            .surveys
            .find_by(&[("patient_id", id.as_str()), ("status", active.as_str())])
            .await?;
        if !surveys.is_empty() {
            return Err(TrialError::Conflict(format!(
                "patient {} has an active survey",
                patient.patient_code
            )));
        }

        self.repos.patients.delete(id.as_str()).await?;

        tracing::info!(patient_id = %id, "Patient deleted");

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::PatientDeleted,
                    "patient",
                    format!("Deleted patient {}", patient.patient_code),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(id)
                .organization(Some(patient.organization_id.clone()))
                .patient(id.clone()),
            )
            .await?;

        Ok(())
    }

    async fn log_updated(
        &self,
        principal: &Principal,
        patient: &Patient,
        changes: ChangeSet,
    ) -> Result<()> {
        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::PatientUpdated,
                    "patient",
                    format!("Updated patient {}", patient.patient_code),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&patient.id)
                .changes(changes.into_changes())
                .organization(Some(patient.organization_id.clone()))
                .patient(patient.id.clone()),
            )
            .await?;
        Ok(())
    }
}

fn validate_birth_year(birth_year: Option<i32>) -> Result<()> {
    match birth_year {
        Some(year) if !(1900..=2100).contains(&year) => Err(TrialError::Validation(format!(
            "birth year {year} is out of range"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::adapters::store::Repository;
    use crate::domain::{Organization, OrganizationType, Role, Survey};
    use chrono::NaiveDate;
    use std::sync::Arc;

    async fn setup() -> (PatientService, Organization) {
        let repos = Repositories::new(Arc::new(MemoryStore::new()));
        let audit = AuditService::new(Repository::new(Arc::clone(&repos.store)), true);
        let org = Organization::builder()
            .name("Site")
            .code("UH-01")
            .organization_type(OrganizationType::Hospital)
            .build()
            .unwrap();
        repos.organizations.insert(&org).await.unwrap();
        (PatientService::new(repos, audit), org)
    }

    #[tokio::test]
    async fn test_patient_code_unique_within_org() {
        let (patients, org) = setup().await;
        let admin = Principal::system();
        patients
            .create(&admin, NewPatient::new(org.id.clone(), "P-001"))
            .await
            .unwrap();
        let err = patients
            .create(&admin, NewPatient::new(org.id.clone(), "P-001"))
            .await
            .unwrap_err();
        assert!(matches!(err, TrialError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_other_site_is_forbidden() {
        let (patients, org) = setup().await;
        let outsider = Principal::new(
            None,
            "cc",
            Role::Coordinator,
            Some(OrganizationId::new("org-x").unwrap()),
        );
        let err = patients
            .create(&outsider, NewPatient::new(org.id.clone(), "P-001"))
            .await
            .unwrap_err();
        assert!(matches!(err, TrialError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let (patients, org) = setup().await;
        let admin = Principal::system();
        let a = patients
            .create(&admin, NewPatient::new(org.id.clone(), "P-002"))
            .await
            .unwrap();
        patients
            .create(&admin, NewPatient::new(org.id.clone(), "P-001"))
            .await
            .unwrap();
        patients
            .set_status(&admin, &a.id, PatientStatus::Active)
            .await
            .unwrap();

        let all = patients
            .list_by_organization(&admin, &org.id, None)
            .await
            .unwrap();
        assert_eq!(
            all.iter().map(|p| p.patient_code.as_str()).collect::<Vec<_>>(),
            vec!["P-001", "P-002"]
        );

        let active = patients
            .list_by_organization(&admin, &org.id, Some(PatientStatus::Active))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a.id);
    }

    #[tokio::test]
    async fn test_delete_refused_with_active_survey() {
        let (patients, org) = setup().await;
        let admin = Principal::system();
        let patient = patients
            .create(&admin, NewPatient::new(org.id.clone(), "P-001"))
            .await
            .unwrap();
        let survey = Survey::new(
            patient.id.clone(),
            crate::domain::StudyId::new("s-1").unwrap(),
            org.id.clone(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );
        patients.repos.surveys.insert(&survey).await.unwrap();

        assert!(matches!(
            patients.delete(&admin, &patient.id).await,
            Err(TrialError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_implausible_birth_year() {
        let (patients, org) = setup().await;
        let admin = Principal::system();
        let patient = patients
            .create(&admin, NewPatient::new(org.id.clone(), "P-001"))
            .await
            .unwrap();
        let err = patients
            .update(
                &admin,
                &patient.id,
                PatientUpdate {
                    birth_year: Some(1850),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TrialError::Validation(_)));
    }
}
