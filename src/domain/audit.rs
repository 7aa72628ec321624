//! Audit log domain model
//!
//! Audit records are immutable compliance evidence. They are created once,
//! never updated, and only removed by the retention sweep. Each record
//! carries a SHA-256 checksum of its own content so that edits made
//! directly in the store are detectable.

use super::ids::{LogId, OrganizationId, PatientId, StudyId, UserId};
use super::user::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Kind of audited event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    LoginSuccess,
    LoginFailure,
    Logout,
    OrganizationCreated,
    OrganizationUpdated,
    OrganizationDeleted,
    PatientCreated,
    PatientUpdated,
    PatientDeleted,
    StudyCreated,
    StudyUpdated,
    PatientEnrolled,
    PatientWithdrawn,
    SurveyCompleted,
    VisitStatusChanged,
    VisitRescheduled,
    ExaminationRecorded,
    ExaminationSkipped,
    DeviationDetected,
    UserCreated,
    UserUpdated,
    UserDeleted,
    RoleChanged,
    PasswordReset,
    PermissionDenied,
    AuditExported,
    RetentionSweep,
}

impl AuditEventType {
    /// Whether the event modified stored clinical or administrative data
    pub fn is_data_modification(&self) -> bool {
        use AuditEventType::*;
        matches!(
            self,
            OrganizationCreated
                | OrganizationUpdated
                | OrganizationDeleted
                | PatientCreated
                | PatientUpdated
                | PatientDeleted
                | StudyCreated
                | StudyUpdated
                | PatientEnrolled
                | PatientWithdrawn
                | VisitStatusChanged
                | VisitRescheduled
                | ExaminationRecorded
                | ExaminationSkipped
                | UserCreated
                | UserUpdated
                | UserDeleted
                | RoleChanged
        )
    }

    /// Whether the event removed data
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            AuditEventType::OrganizationDeleted
                | AuditEventType::PatientDeleted
                | AuditEventType::UserDeleted
        )
    }

    /// Default severity when the caller does not choose one
    pub fn default_severity(&self) -> Severity {
        use AuditEventType::*;
        match self {
            LoginSuccess | Logout | ExaminationRecorded => Severity::Info,
            OrganizationCreated | PatientCreated | StudyCreated | PatientEnrolled
            | VisitStatusChanged | VisitRescheduled | UserCreated | SurveyCompleted => {
                Severity::Low
            }
            OrganizationUpdated | PatientUpdated | StudyUpdated | UserUpdated | LoginFailure
            | ExaminationSkipped | PasswordReset | AuditExported | RetentionSweep
            | PatientWithdrawn => Severity::Medium,
            OrganizationDeleted | PatientDeleted | UserDeleted | RoleChanged
            | PermissionDenied | DeviationDetected => Severity::High,
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Serialized form is the canonical name
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{self:?}"));
        f.write_str(&name)
    }
}

/// Event severity, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// One changed field of an update event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
}

impl FieldChange {
    pub fn new(
        field: impl Into<String>,
        old_value: impl Serialize,
        new_value: impl Serialize,
    ) -> Self {
        Self {
            field: field.into(),
            old_value: serde_json::to_value(old_value).unwrap_or(serde_json::Value::Null),
            new_value: serde_json::to_value(new_value).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Collects the changes between two values of the same field set
///
/// Fields whose values compare equal are omitted.
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `field` when `old` and `new` differ
    pub fn track<T: Serialize + PartialEq>(&mut self, field: &str, old: &T, new: &T) -> &mut Self {
        if old != new {
            self.changes.push(FieldChange::new(field, old, new));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_changes(self) -> Option<Vec<FieldChange>> {
        if self.changes.is_empty() {
            None
        } else {
            Some(self.changes)
        }
    }
}

/// An immutable audit log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogRecord {
    pub log_id: LogId,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// User who caused the event (`None` for system tasks)
    #[serde(default)]
    pub actor_id: Option<UserId>,
    #[serde(default)]
    pub actor_role: Option<Role>,
    /// Entity kind the event refers to ("patient", "visit", ...)
    pub target_type: String,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub changes: Option<Vec<FieldChange>>,
    pub severity: Severity,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub study_id: Option<StudyId>,
    #[serde(default)]
    pub patient_id: Option<PatientId>,
    pub description: String,
    /// Hex SHA-256 of every other field
    pub checksum: String,
}

/// Borrowed view of the checksummed fields, serialized in declaration order
#[derive(Serialize)]
struct ChecksumContent<'a> {
    log_id: &'a LogId,
    timestamp: &'a DateTime<Utc>,
    event_type: &'a AuditEventType,
    actor_id: &'a Option<UserId>,
    actor_role: &'a Option<Role>,
    target_type: &'a str,
    target_id: &'a Option<String>,
    changes: &'a Option<Vec<FieldChange>>,
    severity: &'a Severity,
    organization_id: &'a Option<OrganizationId>,
    study_id: &'a Option<StudyId>,
    patient_id: &'a Option<PatientId>,
    description: &'a str,
}

impl AuditLogRecord {
    /// Computes the checksum of the record's content
    pub fn compute_checksum(&self) -> String {
        let content = ChecksumContent {
            log_id: &self.log_id,
            timestamp: &self.timestamp,
            event_type: &self.event_type,
            actor_id: &self.actor_id,
            actor_role: &self.actor_role,
            target_type: &self.target_type,
            target_id: &self.target_id,
            changes: &self.changes,
            severity: &self.severity,
            organization_id: &self.organization_id,
            study_id: &self.study_id,
            patient_id: &self.patient_id,
            description: &self.description,
        };
        let bytes = serde_json::to_vec(&content).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Whether the stored checksum matches the content
    pub fn verify_checksum(&self) -> bool {
        self.checksum == self.compute_checksum()
    }
}

/// Description of an event to be recorded
///
/// Built by services and turned into an [`AuditLogRecord`] by the audit
/// service, which assigns id, timestamp and checksum.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub actor_id: Option<UserId>,
    pub actor_role: Option<Role>,
    pub target_type: String,
    pub target_id: Option<String>,
    pub changes: Option<Vec<FieldChange>>,
    pub severity: Severity,
    pub organization_id: Option<OrganizationId>,
    pub study_id: Option<StudyId>,
    pub patient_id: Option<PatientId>,
    pub description: String,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        target_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            actor_id: None,
            actor_role: None,
            target_type: target_type.into(),
            target_id: None,
            changes: None,
            severity: event_type.default_severity(),
            organization_id: None,
            study_id: None,
            patient_id: None,
            description: description.into(),
        }
    }

    pub fn actor(mut self, actor_id: Option<UserId>, role: Role) -> Self {
        self.actor_id = actor_id;
        self.actor_role = Some(role);
        self
    }

    pub fn target(mut self, target_id: impl fmt::Display) -> Self {
        self.target_id = Some(target_id.to_string());
        self
    }

    pub fn changes(mut self, changes: Option<Vec<FieldChange>>) -> Self {
        self.changes = changes;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn organization(mut self, organization_id: Option<OrganizationId>) -> Self {
        self.organization_id = organization_id;
        self
    }

    pub fn study(mut self, study_id: StudyId) -> Self {
        self.study_id = Some(study_id);
        self
    }

    pub fn patient(mut self, patient_id: PatientId) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    /// Seals the event into a record
    pub fn into_record(self, log_id: LogId, timestamp: DateTime<Utc>) -> AuditLogRecord {
        let mut record = AuditLogRecord {
            log_id,
            timestamp,
            event_type: self.event_type,
            actor_id: self.actor_id,
            actor_role: self.actor_role,
            target_type: self.target_type,
            target_id: self.target_id,
            changes: self.changes,
            severity: self.severity,
            organization_id: self.organization_id,
            study_id: self.study_id,
            patient_id: self.patient_id,
            description: self.description,
            checksum: String::new(),
        };
        record.checksum = record.compute_checksum();
        record
    }
}
