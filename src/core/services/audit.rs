//! Audit trail service
//!
//! Records are written create-only and never updated. The only removal path
//! is [`AuditService::retention_sweep`].

use crate::adapters::store::Repository;
use crate::core::access::{authorize, Permission, Principal};
use crate::domain::{
    AuditEvent, AuditEventType, AuditLogRecord, LogId, OrganizationId, PatientId, Result,
    Severity, StudyId, TrialError, UserId,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Criteria for [`AuditService::query`]
///
/// Empty criteria match everything. `from` is inclusive, `to` exclusive.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event_types: Vec<AuditEventType>,
    pub actor_id: Option<UserId>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub organization_id: Option<OrganizationId>,
    pub study_id: Option<StudyId>,
    pub patient_id: Option<PatientId>,
    pub min_severity: Option<Severity>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        }
    }

    pub fn organization(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn event_types(mut self, event_types: Vec<AuditEventType>) -> Self {
        self.event_types = event_types;
        self
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Whether `record` satisfies every criterion except paging
    pub fn matches(&self, record: &AuditLogRecord) -> bool {
        if !self.event_types.is_empty() && !self.event_types.contains(&record.event_type) {
            return false;
        }
        if self.actor_id.is_some() && record.actor_id != self.actor_id {
            return false;
        }
        if let Some(ref target_type) = self.target_type {
            if &record.target_type != target_type {
                return false;
            }
        }
        if self.target_id.is_some() && record.target_id != self.target_id {
            return false;
        }
        if self.organization_id.is_some() && record.organization_id != self.organization_id {
            return false;
        }
        if self.study_id.is_some() && record.study_id != self.study_id {
            return false;
        }
        if self.patient_id.is_some() && record.patient_id != self.patient_id {
            return false;
        }
        if let Some(min) = self.min_severity {
            if record.severity < min {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.timestamp >= to {
                return false;
            }
        }
        true
    }

    /// Filters, sorts newest first and pages `records`
    pub fn apply(&self, records: Vec<AuditLogRecord>) -> Vec<AuditLogRecord> {
        let mut matching: Vec<AuditLogRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();
        matching.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.log_id.cmp(&a.log_id))
        });
        matching
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Outcome of a retention sweep
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RetentionSweepSummary {
    pub cutoff: DateTime<Utc>,
    pub examined: usize,
    pub expired: usize,
    pub deleted: usize,
    pub dry_run: bool,
}

#[derive(Clone)]
pub struct AuditService {
    records: Repository<AuditLogRecord>,
    enabled: bool,
}

impl AuditService {
    pub fn new(records: Repository<AuditLogRecord>, enabled: bool) -> Self {
        Self { records, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Seals and stores an event
    ///
    /// With auditing disabled the sealed record is returned without being
    /// stored.
    pub async fn log(&self, event: AuditEvent) -> Result<AuditLogRecord> {
        let record = event.into_record(LogId::generate(), Utc::now());
        if self.enabled {
            self.records.insert(&record).await?;
            crate::log_audit_event!(record);
        }
        Ok(record)
    }

    /// Authorizes `principal`, recording a `PermissionDenied` event on refusal
    pub async fn check(
        &self,
        principal: &Principal,
        permission: Permission,
        scope: Option<&OrganizationId>,
        target_type: &str,
    ) -> Result<()> {
        match authorize(principal, permission, scope) {
            Ok(()) => Ok(()),
            Err(denied) => Err(self.deny(principal, scope, target_type, denied).await),
        }
    }

    /// Records a refused operation and hands back the error to return
    pub async fn deny(
        &self,
        principal: &Principal,
        scope: Option<&OrganizationId>,
        target_type: &str,
        denied: TrialError,
    ) -> TrialError {
        let event = AuditEvent::new(
            AuditEventType::PermissionDenied,
            target_type,
            format!("{} denied: {denied}", principal.username),
        )
        .actor(principal.user_id.clone(), principal.role)
        .organization(scope.cloned().or_else(|| principal.organization_id.clone()));

        match self.log(event).await {
            Ok(_) => denied,
            Err(e) => e,
        }
    }

    /// Records matching `filter`, newest first
    ///
    /// Callers below super admin only ever see their own organization.
    pub async fn query(
        &self,
        principal: &Principal,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditLogRecord>> {
        let filter = self
            .scoped_filter(principal, filter, Permission::ReadAudit)
            .await?;
        self.fetch(&filter).await
    }

    /// Like [`query`](Self::query) for export, itself recorded as `AuditExported`
    pub async fn export(
        &self,
        principal: &Principal,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditLogRecord>> {
        let filter = self
            .scoped_filter(principal, filter, Permission::ExportAudit)
            .await?;
        let records = self.fetch(&filter).await?;

        self.log(
            AuditEvent::new(
                AuditEventType::AuditExported,
                "audit_log",
                format!("Exported {} audit record(s)", records.len()),
            )
            .actor(principal.user_id.clone(), principal.role)
            .organization(filter.organization_id.clone()),
        )
        .await?;

        Ok(records)
    }

    async fn scoped_filter(
        &self,
        principal: &Principal,
        filter: &AuditFilter,
        permission: Permission,
    ) -> Result<AuditFilter> {
        let mut filter = filter.clone();
        if !principal.is_super_admin() && filter.organization_id.is_none() {
            filter.organization_id = principal.organization_id.clone();
        }
        self.check(
            principal,
            permission,
            filter.organization_id.as_ref(),
            "audit_log",
        )
        .await?;
        Ok(filter)
    }

    async fn fetch(&self, filter: &AuditFilter) -> Result<Vec<AuditLogRecord>> {
        let records = match filter.organization_id {
            Some(ref org) => {
                self.records
                    .find_by(&[("organization_id", org.as_str())])
                    .await?
            }
            None => self.records.list().await?,
        };
        Ok(filter.apply(records))
    }

    /// Deletes records older than `retention_days` before `now`
    ///
    /// The sweep itself is recorded as a `RetentionSweep` event unless
    /// `dry_run` is set.
    pub async fn retention_sweep(
        &self,
        principal: &Principal,
        retention_days: i64,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<RetentionSweepSummary> {
        self.check(principal, Permission::RunRetention, None, "audit_log")
            .await?;

        let cutoff = Duration::try_days(retention_days)
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                TrialError::Validation(format!(
                    "retention of {retention_days} days reaches before the calendar start"
                ))
            })?;
        let records = self.records.list().await?;
        let examined = records.len();
        let expired: Vec<&AuditLogRecord> =
            records.iter().filter(|r| r.timestamp < cutoff).collect();

        let mut deleted = 0;
        if !dry_run {
            for record in &expired {
                if self.records.delete(record.log_id.as_str()).await? {
                    deleted += 1;
                }
            }
        }

        tracing::info!(
            cutoff = %cutoff,
            examined = examined,
            expired = expired.len(),
            deleted = deleted,
            dry_run = dry_run,
            "Audit retention sweep finished"
        );

        let summary = RetentionSweepSummary {
            cutoff,
            examined,
            expired: expired.len(),
            deleted,
            dry_run,
        };

        if !dry_run {
            self.log(
                AuditEvent::new(
                    AuditEventType::RetentionSweep,
                    "audit_log",
                    format!(
                        "Deleted {deleted} audit record(s) older than {retention_days} days (cutoff {cutoff})"
                    ),
                )
                .actor(principal.user_id.clone(), principal.role),
            )
            .await?;
        }

        Ok(summary)
    }
}
