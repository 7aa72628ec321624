//! Report command implementation
//!
//! `report compliance` aggregates the audit trail over a date range and
//! `report study` summarizes enrollment and deviations of one study.

use super::connect;
use crate::cli::{exit_code_for, EXIT_CONFIG, EXIT_FINDINGS, EXIT_OK};
use crate::core::access::Principal;
use crate::core::reports::{ComplianceReport, ReportPeriod, StudyProgressReport};
use crate::core::services::{AuditFilter, Services};
use crate::domain::{OrganizationId, Result, StudyId};
use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};

/// Arguments for the report command
#[derive(Args, Debug)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub kind: ReportKind,
}

#[derive(Subcommand, Debug)]
pub enum ReportKind {
    /// Audit trail compliance over a date range
    Compliance(ComplianceArgs),

    /// Enrollment, follow-up and deviation summary of a study
    Study(StudyArgs),
}

#[derive(Args, Debug)]
pub struct ComplianceArgs {
    /// First day of the period (YYYY-MM-DD)
    #[arg(long)]
    pub from: NaiveDate,

    /// Last day of the period, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub to: NaiveDate,

    /// Restrict to one organization
    #[arg(long)]
    pub organization: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StudyArgs {
    /// Study to report on
    #[arg(long)]
    pub study: String,

    /// Reference date for deviation detection, defaults to today
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ReportArgs {
    /// Execute the report command
    ///
    /// Exits with 1 when the report contains findings.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        match &self.kind {
            ReportKind::Compliance(args) => args.execute(config_path).await,
            ReportKind::Study(args) => args.execute(config_path).await,
        }
    }
}

impl ComplianceArgs {
    /// Period covering whole days from `--from` through `--to`
    fn period(&self) -> std::result::Result<ReportPeriod, String> {
        let from = self.from.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
        let to = self
            .to
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc());
        match (from, to) {
            (Some(from), Some(to)) => ReportPeriod::new(from, to),
            _ => Err("invalid report dates".to_string()),
        }
    }

    async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let period = match self.period() {
            Ok(p) => p,
            Err(e) => {
                println!("❌ {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let organization = match self
            .organization
            .clone()
            .map(OrganizationId::new)
            .transpose()
        {
            Ok(org) => org,
            Err(e) => {
                println!("❌ Invalid organization id: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        tracing::info!(
            from = %period.from,
            to = %period.to,
            organization = ?organization,
            "Generating compliance report"
        );

        let (_config, services) = match connect(config_path).await {
            Ok(connected) => connected,
            Err(code) => return Ok(code),
        };

        let report = match compliance_report(&services, period, organization).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Compliance report failed");
                println!("❌ Compliance report failed");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", report.format_summary());
        }

        Ok(if report.has_findings() {
            EXIT_FINDINGS
        } else {
            EXIT_OK
        })
    }
}

impl StudyArgs {
    async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let study_id = match StudyId::new(self.study.clone()) {
            Ok(id) => id,
            Err(e) => {
                println!("❌ Invalid study id: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let as_of = self.as_of.unwrap_or_else(|| Utc::now().date_naive());

        tracing::info!(study_id = %study_id, as_of = %as_of, "Generating study report");

        let (_config, services) = match connect(config_path).await {
            Ok(connected) => connected,
            Err(code) => return Ok(code),
        };

        let report = match study_report(&services, &study_id, as_of).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, study_id = %study_id, "Study report failed");
                println!("❌ Study report failed");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", report.format_summary());
        }

        Ok(if report.major_deviations() > 0 {
            EXIT_FINDINGS
        } else {
            EXIT_OK
        })
    }
}

/// Builds a compliance report from the audit trail
pub async fn compliance_report(
    services: &Services,
    period: ReportPeriod,
    organization: Option<OrganizationId>,
) -> Result<ComplianceReport> {
    let mut filter = AuditFilter::between(period.from, period.to);
    if let Some(ref org) = organization {
        filter = filter.organization(org.clone());
    }
    let records = services.audit.export(&Principal::system(), &filter).await?;
    Ok(ComplianceReport::build(&records, period).for_organization(organization))
}

/// Builds a progress report for one study
pub async fn study_report(
    services: &Services,
    study_id: &StudyId,
    as_of: NaiveDate,
) -> Result<StudyProgressReport> {
    let principal = Principal::system();
    let study = services.studies.get(&principal, study_id).await?;
    let surveys = services.surveys.list_by_study(&principal, study_id).await?;
    let deviations = services
        .visits
        .detect_for_study(&principal, study_id, as_of)
        .await?;
    Ok(StudyProgressReport::build(&study, &surveys, &deviations))
}
