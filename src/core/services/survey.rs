//! Enrollment and survey lifecycle

use super::audit::AuditService;
use super::stored_name;
use crate::adapters::store::Repositories;
use crate::core::access::{Permission, Principal};
use crate::core::scheduling::{expected_completion_date, plan_visits, SurveyProgress};
use crate::domain::{
    AuditEvent, AuditEventType, ChangeSet, PatientId, PatientStatus, Result, StudyId, Survey,
    SurveyId, SurveyStatus, TrialError, Visit, VisitStatus,
};
use chrono::{NaiveDate, Utc};

#[derive(Clone)]
pub struct SurveyService {
    repos: Repositories,
    audit: AuditService,
}

impl SurveyService {
    pub fn new(repos: Repositories, audit: AuditService) -> Self {
        Self { repos, audit }
    }

    /// Enrolls a patient in a study and plans the visit schedule
    ///
    /// # Errors
    ///
    /// - [`TrialError::EnrollmentClosed`] when the study does not target the
    ///   patient's site, is not active or is full
    /// - [`TrialError::Conflict`] when the patient already has a survey for
    ///   the study
    pub async fn enroll(
        &self,
        principal: &Principal,
        patient_id: &PatientId,
        study_id: &StudyId,
        baseline: NaiveDate,
    ) -> Result<Survey> {
        let mut patient = self.repos.patients.require(patient_id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::WriteSurvey,
                Some(&patient.organization_id),
                "survey",
            )
            .await?;

        let mut study = self.repos.studies.require(study_id.as_str()).await?;
        if !study.targets(&patient.organization_id) {
            return Err(TrialError::EnrollmentClosed(format!(
                "study {} is not open to organization {}",
                study.code, patient.organization_id
            )));
        }

        let existing = self
            .repos
            .surveys
            .find_by(&[
                ("patient_id", patient_id.as_str()),
                ("study_id", study_id.as_str()),
            ])
            .await?;
        if !existing.is_empty() {
            return Err(TrialError::Conflict(format!(
                "patient {} is already enrolled in study {}",
                patient.patient_code, study.code
            )));
        }

        study.enroll()?;

        let mut survey = Survey::new(
            patient.id.clone(),
            study.id.clone(),
            patient.organization_id.clone(),
            baseline,
        );
        let visits = plan_visits(&study, &survey, baseline)?;
        survey.expected_completion_date = expected_completion_date(&study, baseline)?;
        SurveyProgress::from_visits(&visits).apply_to(&mut survey);

        // The survey row marks the enrollment, so it is written after its
        // visits and removed again if the study counters cannot be saved
        let stored: Result<()> = async {
            for visit in &visits {
                self.repos.visits.insert(visit).await?;
            }
            self.repos.surveys.insert(&survey).await?;
            if let Err(e) = self.repos.studies.save(&study).await {
                self.repos.surveys.delete(survey.id.as_str()).await?;
                return Err(e);
            }
            Ok(())
        }
        .await;
        if let Err(e) = stored {
            self.discard_visits(&visits).await;
            return Err(e);
        }

        patient.status = PatientStatus::Active;
        if !patient.is_enrolled_in(&study.id) {
            patient.enrolled_study_ids.push(study.id.clone());
        }
        patient.updated_at = Utc::now();
        self.repos.patients.save(&patient).await?;

        tracing::info!(
            survey_id = %survey.id,
            patient_id = %patient.id,
            study_id = %study.id,
            visits = visits.len(),
            expected_completion = %survey.expected_completion_date,
            "Patient enrolled"
        );

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::PatientEnrolled,
                    "survey",
                    format!(
                        "Enrolled patient {} in study {} with {} visit(s)",
                        patient.patient_code,
                        study.code,
                        visits.len()
                    ),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&survey.id)
                .organization(Some(survey.organization_id.clone()))
                .study(study.id.clone())
                .patient(patient.id.clone()),
            )
            .await?;

        Ok(survey)
    }

    /// Best-effort removal of visits written by an aborted enrollment
    async fn discard_visits(&self, visits: &[Visit]) {
        for visit in visits {
            if let Err(e) = self.repos.visits.delete(visit.id.as_str()).await {
                tracing::warn!(
                    visit_id = %visit.id,
                    error = %e,
                    "Failed to remove visit after aborted enrollment"
                );
            }
        }
    }

    pub async fn get(&self, principal: &Principal, id: &SurveyId) -> Result<Survey> {
        let survey = self.repos.surveys.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::ReadSurvey,
                Some(&survey.organization_id),
                "survey",
            )
            .await?;
        Ok(survey)
    }

    pub async fn list_by_patient(
        &self,
        principal: &Principal,
        patient_id: &PatientId,
    ) -> Result<Vec<Survey>> {
        let patient = self.repos.patients.require(patient_id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::ReadSurvey,
                Some(&patient.organization_id),
                "survey",
            )
            .await?;

        let mut surveys = self
            .repos
            .surveys
            .find_by(&[("patient_id", patient_id.as_str())])
            .await?;
        surveys.sort_by_key(|s| s.created_at);
        Ok(surveys)
    }

    /// Surveys of a study; callers below super admin see their own site only
    pub async fn list_by_study(
        &self,
        principal: &Principal,
        study_id: &StudyId,
    ) -> Result<Vec<Survey>> {
        self.audit
            .check(principal, Permission::ReadSurvey, None, "survey")
            .await?;

        let mut surveys = self
            .repos
            .surveys
            .find_by(&[("study_id", study_id.as_str())])
            .await?;
        if !principal.is_super_admin() {
            surveys.retain(|s| principal.can_access(&s.organization_id));
        }
        surveys.sort_by_key(|s| s.created_at);
        Ok(surveys)
    }

    /// Visits of a survey ordered by visit number
    pub(crate) async fn visits_of(&self, survey_id: &SurveyId) -> Result<Vec<Visit>> {
        let mut visits = self
            .repos
            .visits
            .find_by(&[("survey_id", survey_id.as_str())])
            .await?;
        visits.sort_by_key(|v| v.visit_number);
        Ok(visits)
    }

    /// Withdraws the patient from the study, cancelling every open visit
    ///
    /// # Errors
    ///
    /// Returns [`TrialError::Conflict`] unless the survey is active.
    pub async fn withdraw(
        &self,
        principal: &Principal,
        id: &SurveyId,
        reason: &str,
    ) -> Result<Survey> {
        let mut survey = self.repos.surveys.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::WriteSurvey,
                Some(&survey.organization_id),
                "survey",
            )
            .await?;

        if !survey.is_active() {
            return Err(TrialError::Conflict(format!(
                "survey {} is already {}",
                survey.id,
                survey.status.as_str()
            )));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TrialError::Validation(
                "a withdrawal reason is required".to_string(),
            ));
        }

        let mut visits = self.visits_of(&survey.id).await?;
        let mut cancelled = 0;
        for visit in visits.iter_mut().filter(|v| !v.status.is_closed()) {
            visit.status = VisitStatus::Cancelled;
            visit.updated_at = Utc::now();
            self.repos.visits.save(visit).await?;
            cancelled += 1;
        }

        let mut changes = ChangeSet::new();
        changes.track("status", &survey.status, &SurveyStatus::Withdrawn);
        survey.status = SurveyStatus::Withdrawn;
        survey.withdrawal_reason = Some(reason.to_string());
        SurveyProgress::from_visits(&visits).apply_to(&mut survey);
        self.repos.surveys.save(&survey).await?;

        if let Some(mut study) = self.repos.studies.get(survey.study_id.as_str()).await? {
            study.record_withdrawal();
            self.repos.studies.save(&study).await?;
        }
        self.settle_patient(&survey.patient_id, PatientStatus::Withdrawn)
            .await?;

        tracing::info!(
            survey_id = %survey.id,
            cancelled_visits = cancelled,
            "Patient withdrawn"
        );

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::PatientWithdrawn,
                    "survey",
                    format!("Withdrew survey {}: {reason}", survey.id),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&survey.id)
                .changes(changes.into_changes())
                .organization(Some(survey.organization_id.clone()))
                .study(survey.study_id.clone())
                .patient(survey.patient_id.clone()),
            )
            .await?;

        Ok(survey)
    }

    /// Recomputes progress counters from the survey's visits
    pub async fn refresh_progress(&self, principal: &Principal, id: &SurveyId) -> Result<Survey> {
        let survey = self.repos.surveys.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::WriteSurvey,
                Some(&survey.organization_id),
                "survey",
            )
            .await?;
        self.recompute(principal, survey).await
    }

    /// Progress refresh for callers that already authorized the change
    pub(crate) async fn recompute(
        &self,
        principal: &Principal,
        mut survey: Survey,
    ) -> Result<Survey> {
        let visits = self.visits_of(&survey.id).await?;
        let progress = SurveyProgress::from_visits(&visits);
        let completed_now = progress.apply_to(&mut survey);
        self.repos.surveys.save(&survey).await?;

        tracing::debug!(
            survey_id = %survey.id,
            completed = progress.completed,
            total = progress.total,
            percentage = survey.completion_percentage,
            "Survey progress refreshed"
        );

        if completed_now {
            if let Some(mut study) = self.repos.studies.get(survey.study_id.as_str()).await? {
                study.record_completion();
                self.repos.studies.save(&study).await?;
            }
            self.settle_patient(&survey.patient_id, PatientStatus::Completed)
                .await?;

            tracing::info!(survey_id = %survey.id, "Survey completed");

            self.audit
                .log(
                    AuditEvent::new(
                        AuditEventType::SurveyCompleted,
                        "survey",
                        format!(
                            "Survey completed with {} of {} visit(s)",
                            progress.completed, progress.total
                        ),
                    )
                    .actor(principal.user_id.clone(), principal.role)
                    .target(&survey.id)
                    .organization(Some(survey.organization_id.clone()))
                    .study(survey.study_id.clone())
                    .patient(survey.patient_id.clone()),
                )
                .await?;
        }

        Ok(survey)
    }

    /// Moves the patient to `status` once no survey of theirs is still active
    async fn settle_patient(&self, patient_id: &PatientId, status: PatientStatus) -> Result<()> {
        let active = stored_name(&SurveyStatus::Active);
        let still_active = self
            .repos
            .surveys
            .find_by(&[
                ("patient_id", patient_id.as_str()),
                ("status", active.as_str()),
            ])
            .await?;
        if !still_active.is_empty() {
            return Ok(());
        }

        if let Some(mut patient) = self.repos.patients.get(patient_id.as_str()).await? {
            if patient.status != status {
                patient.status = status;
                patient.updated_at = Utc::now();
                self.repos.patients.save(&patient).await?;
            }
        }
        Ok(())
    }
}
