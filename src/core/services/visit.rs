//! Visit execution: status changes, examinations and deviation checks

use super::audit::AuditService;
use super::survey::SurveyService;
use crate::adapters::store::Repositories;
use crate::core::access::{Permission, Principal};
use crate::core::scheduling::{self, detect_deviations, DeviationPolicy, ProtocolDeviation};
use crate::domain::{
    AuditEvent, AuditEventType, ChangeSet, OrganizationId, Result, SkippedExamination, StudyId,
    Survey, TrialError, Visit, VisitId, VisitStatus,
};
use chrono::{NaiveDate, Utc};
use futures::future::try_join_all;

/// Result of [`VisitService::complete`]
#[derive(Debug, Clone)]
pub struct VisitCompletion {
    pub visit: Visit,
    pub survey: Survey,
    /// Findings against the completed visit
    pub deviations: Vec<ProtocolDeviation>,
}

#[derive(Clone)]
pub struct VisitService {
    repos: Repositories,
    audit: AuditService,
    surveys: SurveyService,
    policy: DeviationPolicy,
}

impl VisitService {
    pub fn new(
        repos: Repositories,
        audit: AuditService,
        surveys: SurveyService,
        policy: DeviationPolicy,
    ) -> Self {
        Self {
            repos,
            audit,
            surveys,
            policy,
        }
    }

    pub fn policy(&self) -> &DeviationPolicy {
        &self.policy
    }

    pub async fn get(&self, principal: &Principal, id: &VisitId) -> Result<Visit> {
        let visit = self.repos.visits.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::ReadVisit,
                Some(&visit.organization_id),
                "visit",
            )
            .await?;
        Ok(visit)
    }

    pub async fn list_by_survey(
        &self,
        principal: &Principal,
        survey_id: &crate::domain::SurveyId,
    ) -> Result<Vec<Visit>> {
        let survey = self.repos.surveys.require(survey_id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::ReadVisit,
                Some(&survey.organization_id),
                "visit",
            )
            .await?;
        self.surveys.visits_of(survey_id).await
    }

    /// Open visits of a site scheduled within `from..=to`, earliest first
    pub async fn upcoming(
        &self,
        principal: &Principal,
        organization_id: &OrganizationId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Visit>> {
        self.audit
            .check(
                principal,
                Permission::ReadVisit,
                Some(organization_id),
                "visit",
            )
            .await?;

        let mut visits: Vec<Visit> = self
            .repos
            .visits
            .find_by(&[("organization_id", organization_id.as_str())])
            .await?
            .into_iter()
            .filter(|v| !v.status.is_closed())
            .filter(|v| v.scheduled_date >= from && v.scheduled_date <= to)
            .collect();
        visits.sort_by(|a, b| {
            a.scheduled_date
                .cmp(&b.scheduled_date)
                .then_with(|| a.visit_number.cmp(&b.visit_number))
        });
        Ok(visits)
    }

    pub async fn start(&self, principal: &Principal, id: &VisitId) -> Result<Visit> {
        self.set_status(principal, id, VisitStatus::InProgress).await
    }

    pub async fn mark_missed(&self, principal: &Principal, id: &VisitId) -> Result<Visit> {
        self.set_status(principal, id, VisitStatus::Missed).await
    }

    pub async fn cancel(&self, principal: &Principal, id: &VisitId) -> Result<Visit> {
        self.set_status(principal, id, VisitStatus::Cancelled).await
    }

    /// Applies `status` as given and refreshes the survey's progress
    ///
    /// Transitions are not validated; any status may follow any other.
    pub async fn set_status(
        &self,
        principal: &Principal,
        id: &VisitId,
        status: VisitStatus,
    ) -> Result<Visit> {
        let mut visit = self.load_for_write(principal, id).await?;
        if visit.status == status {
            return Ok(visit);
        }

        let mut changes = ChangeSet::new();
        changes.track("status", &visit.status, &status);
        visit.status = status;
        visit.updated_at = Utc::now();
        self.repos.visits.save(&visit).await?;

        self.log_status_change(principal, &visit, changes).await?;
        self.refresh_survey(principal, &visit).await?;
        Ok(visit)
    }

    /// Marks the visit completed on `actual_date` and checks it for deviations
    ///
    /// Each finding against this visit is written to the audit trail as a
    /// `DeviationDetected` event.
    pub async fn complete(
        &self,
        principal: &Principal,
        id: &VisitId,
        actual_date: NaiveDate,
    ) -> Result<VisitCompletion> {
        let mut visit = self.load_for_write(principal, id).await?;

        let mut changes = ChangeSet::new();
        changes.track("status", &visit.status, &VisitStatus::Completed);
        changes.track("actual_date", &visit.actual_date, &Some(actual_date));
        visit.status = VisitStatus::Completed;
        visit.actual_date = Some(actual_date);
        visit.updated_at = Utc::now();
        self.repos.visits.save(&visit).await?;
        self.log_status_change(principal, &visit, changes).await?;

        let survey = self.refresh_survey(principal, &visit).await?;

        let visits = self.surveys.visits_of(&visit.survey_id).await?;
        let deviations: Vec<ProtocolDeviation> =
            detect_deviations(&visits, actual_date, &self.policy)
                .into_iter()
                .filter(|d| d.visit_id == visit.id)
                .collect();

        for deviation in &deviations {
            crate::log_deviation!(deviation);
            self.audit
                .log(
                    AuditEvent::new(
                        AuditEventType::DeviationDetected,
                        "visit",
                        format!("{}: {}", deviation.kind, deviation.description),
                    )
                    .actor(principal.user_id.clone(), principal.role)
                    .target(&visit.id)
                    .severity(deviation.severity.audit_severity())
                    .organization(Some(visit.organization_id.clone()))
                    .study(visit.study_id.clone())
                    .patient(visit.patient_id.clone()),
                )
                .await?;
        }

        tracing::info!(
            visit_id = %visit.id,
            survey_id = %visit.survey_id,
            actual_date = %actual_date,
            deviations = deviations.len(),
            "Visit completed"
        );

        Ok(VisitCompletion {
            visit,
            survey,
            deviations,
        })
    }

    /// Moves the visit to `new_date` inside or outside its unchanged window
    pub async fn reschedule(
        &self,
        principal: &Principal,
        id: &VisitId,
        new_date: NaiveDate,
    ) -> Result<Visit> {
        let mut visit = self.load_for_write(principal, id).await?;
        if visit.status.is_closed() {
            return Err(TrialError::Conflict(format!(
                "visit {} is {} and cannot be rescheduled",
                visit.id, visit.status
            )));
        }

        let mut changes = ChangeSet::new();
        changes.track("scheduled_date", &visit.scheduled_date, &new_date);
        changes.track("status", &visit.status, &VisitStatus::Rescheduled);
        scheduling::reschedule(&mut visit, new_date);
        self.repos.visits.save(&visit).await?;

        if !scheduling::planner::visit_window(&visit).contains(new_date) {
            tracing::warn!(
                visit_id = %visit.id,
                new_date = %new_date,
                window_start = %visit.window_start,
                window_end = %visit.window_end,
                "Visit rescheduled outside its protocol window"
            );
        }

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::VisitRescheduled,
                    "visit",
                    format!("Rescheduled visit {} to {new_date}", visit.visit_number),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&visit.id)
                .changes(changes.into_changes())
                .organization(Some(visit.organization_id.clone()))
                .study(visit.study_id.clone())
                .patient(visit.patient_id.clone()),
            )
            .await?;

        self.refresh_survey(principal, &visit).await?;
        Ok(visit)
    }

    /// Ticks off a checklist examination
    pub async fn record_examination(
        &self,
        principal: &Principal,
        id: &VisitId,
        code: &str,
    ) -> Result<Visit> {
        let mut visit = self.load_for_examination(principal, id, code).await?;
        if visit.is_examination_completed(code) {
            return Ok(visit);
        }

        visit.skipped_examinations.retain(|s| s.code != code);
        visit.completed_examinations.push(code.to_string());
        visit.updated_at = Utc::now();
        self.repos.visits.save(&visit).await?;

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::ExaminationRecorded,
                    "visit",
                    format!("Recorded examination {code} at visit {}", visit.visit_number),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&visit.id)
                .organization(Some(visit.organization_id.clone()))
                .study(visit.study_id.clone())
                .patient(visit.patient_id.clone()),
            )
            .await?;

        Ok(visit)
    }

    /// Records that a checklist examination was not performed
    ///
    /// # Errors
    ///
    /// Returns [`TrialError::Conflict`] when the examination was already
    /// performed and [`TrialError::Validation`] for an empty reason.
    pub async fn skip_examination(
        &self,
        principal: &Principal,
        id: &VisitId,
        code: &str,
        reason: &str,
    ) -> Result<Visit> {
        let mut visit = self.load_for_examination(principal, id, code).await?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TrialError::Validation(
                "skipping an examination requires a reason".to_string(),
            ));
        }
        if visit.is_examination_completed(code) {
            return Err(TrialError::Conflict(format!(
                "examination {code} was already performed"
            )));
        }

        visit.skipped_examinations.retain(|s| s.code != code);
        visit.skipped_examinations.push(SkippedExamination {
            code: code.to_string(),
            reason: reason.to_string(),
        });
        visit.updated_at = Utc::now();
        self.repos.visits.save(&visit).await?;

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::ExaminationSkipped,
                    "visit",
                    format!(
                        "Skipped examination {code} at visit {}: {reason}",
                        visit.visit_number
                    ),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&visit.id)
                .organization(Some(visit.organization_id.clone()))
                .study(visit.study_id.clone())
                .patient(visit.patient_id.clone()),
            )
            .await?;

        Ok(visit)
    }

    /// Deviations across every survey of a study as of `as_of`
    ///
    /// Callers below super admin only see surveys of their own site.
    pub async fn detect_for_study(
        &self,
        principal: &Principal,
        study_id: &StudyId,
        as_of: NaiveDate,
    ) -> Result<Vec<ProtocolDeviation>> {
        let surveys = self.surveys.list_by_study(principal, study_id).await?;
        self.audit
            .check(principal, Permission::ReadVisit, None, "visit")
            .await?;

        let visit_sets =
            try_join_all(surveys.iter().map(|survey| self.surveys.visits_of(&survey.id))).await?;
        let deviations: Vec<ProtocolDeviation> = visit_sets
            .iter()
            .flat_map(|visits| detect_deviations(visits, as_of, &self.policy))
            .collect();

        tracing::info!(
            study_id = %study_id,
            as_of = %as_of,
            surveys = surveys.len(),
            deviations = deviations.len(),
            "Deviation scan finished"
        );

        Ok(deviations)
    }

    async fn load_for_write(&self, principal: &Principal, id: &VisitId) -> Result<Visit> {
        let visit = self.repos.visits.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::WriteVisit,
                Some(&visit.organization_id),
                "visit",
            )
            .await?;
        Ok(visit)
    }

    async fn load_for_examination(
        &self,
        principal: &Principal,
        id: &VisitId,
        code: &str,
    ) -> Result<Visit> {
        let visit = self.repos.visits.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::RecordExamination,
                Some(&visit.organization_id),
                "visit",
            )
            .await?;

        if !visit.has_examination(code) {
            return Err(TrialError::Validation(format!(
                "examination {code} is not part of visit {}",
                visit.visit_number
            )));
        }
        if matches!(visit.status, VisitStatus::Missed | VisitStatus::Cancelled) {
            return Err(TrialError::Conflict(format!(
                "visit {} is {}",
                visit.id, visit.status
            )));
        }
        Ok(visit)
    }

    async fn log_status_change(
        &self,
        principal: &Principal,
        visit: &Visit,
        changes: ChangeSet,
    ) -> Result<()> {
        tracing::debug!(visit_id = %visit.id, status = %visit.status, "Visit status changed");
        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::VisitStatusChanged,
                    "visit",
                    format!("Visit {} is now {}", visit.visit_number, visit.status),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&visit.id)
                .changes(changes.into_changes())
                .organization(Some(visit.organization_id.clone()))
                .study(visit.study_id.clone())
                .patient(visit.patient_id.clone()),
            )
            .await?;
        Ok(())
    }

    async fn refresh_survey(&self, principal: &Principal, visit: &Visit) -> Result<Survey> {
        let survey = self.repos.surveys.require(visit.survey_id.as_str()).await?;
        self.surveys.recompute(principal, survey).await
    }
}
