//! Compliance report over a period of audit records

use crate::domain::{AuditEventType, AuditLogRecord, LogId, OrganizationId, Severity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

/// Number of actors listed in [`ComplianceReport::top_actors`]
pub const TOP_ACTORS: usize = 10;

/// Half-open reporting interval `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportPeriod {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, String> {
        if to <= from {
            return Err(format!("report period ends ({to}) before it starts ({from})"));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.from && timestamp < self.to
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorActivity {
    /// User id, or `anonymous` for events without an actor
    pub actor: String,
    pub events: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DataModifications {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl DataModifications {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Condensed view of a high or critical event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotableEvent {
    pub log_id: LogId,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub period: ReportPeriod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrganizationId>,
    pub generated_at: DateTime<Utc>,
    pub total_events: usize,
    pub events_by_type: BTreeMap<AuditEventType, usize>,
    pub events_by_severity: BTreeMap<Severity, usize>,
    pub top_actors: Vec<ActorActivity>,
    pub distinct_actors: usize,
    pub failed_logins: usize,
    pub permission_denials: usize,
    pub data_modifications: DataModifications,
    /// High and critical events, newest first
    pub notable_events: Vec<NotableEvent>,
    /// Records whose stored checksum no longer matches their content
    pub checksum_failures: Vec<LogId>,
}

impl ComplianceReport {
    /// Aggregates `records` falling inside `period` in a single pass
    pub fn build(records: &[AuditLogRecord], period: ReportPeriod) -> Self {
        let mut report = Self {
            period,
            organization_id: None,
            generated_at: Utc::now(),
            total_events: 0,
            events_by_type: BTreeMap::new(),
            events_by_severity: BTreeMap::new(),
            top_actors: Vec::new(),
            distinct_actors: 0,
            failed_logins: 0,
            permission_denials: 0,
            data_modifications: DataModifications::default(),
            notable_events: Vec::new(),
            checksum_failures: Vec::new(),
        };
        let mut actors: HashMap<String, usize> = HashMap::new();

        for record in records.iter().filter(|r| period.contains(r.timestamp)) {
            report.total_events += 1;
            *report.events_by_type.entry(record.event_type).or_default() += 1;
            *report.events_by_severity.entry(record.severity).or_default() += 1;

            let actor = record
                .actor_id
                .as_ref()
                .map_or_else(|| "anonymous".to_string(), ToString::to_string);
            *actors.entry(actor).or_default() += 1;

            match record.event_type {
                AuditEventType::LoginFailure => report.failed_logins += 1,
                AuditEventType::PermissionDenied => report.permission_denials += 1,
                _ => {}
            }
            match modification_kind(record.event_type) {
                Some(Modification::Created) => report.data_modifications.created += 1,
                Some(Modification::Updated) => report.data_modifications.updated += 1,
                Some(Modification::Deleted) => report.data_modifications.deleted += 1,
                None => {}
            }

            if record.severity >= Severity::High {
                report.notable_events.push(NotableEvent {
                    log_id: record.log_id.clone(),
                    timestamp: record.timestamp,
                    event_type: record.event_type,
                    severity: record.severity,
                    description: record.description.clone(),
                });
            }
            if !record.verify_checksum() {
                report.checksum_failures.push(record.log_id.clone());
            }
        }

        report.distinct_actors = actors.len();
        let mut ranked: Vec<ActorActivity> = actors
            .into_iter()
            .map(|(actor, events)| ActorActivity { actor, events })
            .collect();
        ranked.sort_by(|a, b| b.events.cmp(&a.events).then_with(|| a.actor.cmp(&b.actor)));
        ranked.truncate(TOP_ACTORS);
        report.top_actors = ranked;

        report
            .notable_events
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        report
    }

    pub fn for_organization(mut self, organization_id: Option<OrganizationId>) -> Self {
        self.organization_id = organization_id;
        self
    }

    /// Whether anything in the period needs a reviewer's attention
    pub fn has_findings(&self) -> bool {
        !self.checksum_failures.is_empty() || !self.notable_events.is_empty()
    }

    /// Plain-text summary for terminals and e-mail
    pub fn format_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Compliance report");
        let _ = writeln!(
            out,
            "Period: {} to {}",
            self.period.from.format("%Y-%m-%d %H:%M UTC"),
            self.period.to.format("%Y-%m-%d %H:%M UTC")
        );
        if let Some(ref org) = self.organization_id {
            let _ = writeln!(out, "Organization: {org}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Total events:        {}", self.total_events);
        let _ = writeln!(out, "Distinct actors:     {}", self.distinct_actors);
        let _ = writeln!(out, "Failed logins:       {}", self.failed_logins);
        let _ = writeln!(out, "Permission denials:  {}", self.permission_denials);
        let _ = writeln!(
            out,
            "Data modifications:  {} (created {}, updated {}, deleted {})",
            self.data_modifications.total(),
            self.data_modifications.created,
            self.data_modifications.updated,
            self.data_modifications.deleted
        );
        let _ = writeln!(out, "Checksum failures:   {}", self.checksum_failures.len());

        if !self.events_by_severity.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "By severity:");
            for (severity, count) in self.events_by_severity.iter().rev() {
                let _ = writeln!(out, "  {severity:<10} {count}");
            }
        }

        if !self.events_by_type.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "By event type:");
            for (event_type, count) in &self.events_by_type {
                let _ = writeln!(out, "  {:<22} {count}", event_type.to_string());
            }
        }

        if !self.top_actors.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Most active actors:");
            for actor in &self.top_actors {
                let _ = writeln!(out, "  {:<38} {}", actor.actor, actor.events);
            }
        }

        if !self.notable_events.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "High and critical events:");
            for event in &self.notable_events {
                let _ = writeln!(
                    out,
                    "  {} [{}] {}: {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.severity,
                    event.event_type,
                    event.description
                );
            }
        }

        if !self.checksum_failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Tampered records:");
            for log_id in &self.checksum_failures {
                let _ = writeln!(out, "  {log_id}");
            }
        }

        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modification {
    Created,
    Updated,
    Deleted,
}

fn modification_kind(event_type: AuditEventType) -> Option<Modification> {
    use AuditEventType::*;
    if event_type.is_deletion() {
        return Some(Modification::Deleted);
    }
    match event_type {
        OrganizationCreated | PatientCreated | StudyCreated | PatientEnrolled | UserCreated => {
            Some(Modification::Created)
        }
        other if other.is_data_modification() => Some(Modification::Updated),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuditEvent, Role, UserId};
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn record(event_type: AuditEventType, actor: Option<&str>, hour: u32) -> AuditLogRecord {
        let mut event = AuditEvent::new(event_type, "test", format!("{event_type} at {hour}"));
        if let Some(actor) = actor {
            event = event.actor(Some(UserId::new(actor).unwrap()), Role::Coordinator);
        }
        event.into_record(LogId::generate(), at(hour))
    }

    fn period() -> ReportPeriod {
        ReportPeriod::new(at(0), at(0) + Duration::days(1)).unwrap()
    }

    #[test]
    fn test_period_rejects_inverted_bounds() {
        assert!(ReportPeriod::new(at(5), at(4)).is_err());
        assert!(period().contains(at(0)));
        assert!(!period().contains(at(0) + Duration::days(1)));
    }

    #[test]
    fn test_counts_in_single_pass() {
        let records = vec![
            record(AuditEventType::LoginFailure, None, 1),
            record(AuditEventType::LoginFailure, None, 2),
            record(AuditEventType::LoginSuccess, Some("u1"), 3),
            record(AuditEventType::PatientCreated, Some("u1"), 4),
            record(AuditEventType::PatientUpdated, Some("u1"), 5),
            record(AuditEventType::PatientDeleted, Some("u2"), 6),
            record(AuditEventType::PermissionDenied, Some("u2"), 7),
        ];
        let report = ComplianceReport::build(&records, period());

        assert_eq!(report.total_events, 7);
        assert_eq!(report.failed_logins, 2);
        assert_eq!(report.permission_denials, 1);
        assert_eq!(
            report.data_modifications,
            DataModifications {
                created: 1,
                updated: 1,
                deleted: 1
            }
        );
        assert_eq!(report.distinct_actors, 3);
        assert_eq!(report.top_actors[0].actor, "u1");
        assert_eq!(report.top_actors[0].events, 3);
        assert_eq!(report.events_by_type[&AuditEventType::LoginFailure], 2);
        // PatientDeleted and PermissionDenied are high severity
        assert_eq!(report.notable_events.len(), 2);
        assert_eq!(report.notable_events[0].event_type, AuditEventType::PermissionDenied);
        assert!(report.checksum_failures.is_empty());
    }

    #[test]
    fn test_records_outside_period_ignored() {
        let mut outside = record(AuditEventType::LoginSuccess, None, 1);
        outside.timestamp = at(0) - Duration::hours(1);
        let report = ComplianceReport::build(&[outside], period());
        assert_eq!(report.total_events, 0);
        assert!(!report.has_findings());
    }

    #[test]
    fn test_tampered_record_reported() {
        let mut tampered = record(AuditEventType::PatientUpdated, Some("u1"), 2);
        tampered.description = "edited in place".to_string();
        let report = ComplianceReport::build(&[tampered.clone()], period());
        assert_eq!(report.checksum_failures, vec![tampered.log_id]);
        assert!(report.has_findings());
        assert!(report.format_summary().contains("Tampered records:"));
    }

    #[test]
    fn test_summary_lists_headline_counts() {
        let records = vec![record(AuditEventType::LoginFailure, None, 1)];
        let summary = ComplianceReport::build(&records, period())
            .for_organization(Some(OrganizationId::new("org-1").unwrap()))
            .format_summary();
        assert!(summary.contains("Organization: org-1"));
        assert!(summary.contains("Failed logins:       1"));
    }
}
