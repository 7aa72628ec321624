//! Audit retention sweep command

use super::connect;
use crate::cli::{exit_code_for, EXIT_CONFIG, EXIT_OK};
use crate::config::MAX_RETENTION_DAYS;
use crate::core::access::Principal;
use chrono::Utc;
use clap::Args;

/// Arguments for the audit-sweep command
#[derive(Args, Debug)]
pub struct AuditSweepArgs {
    /// Retention period in days, defaults to `audit.retention_days`
    #[arg(long)]
    pub retention_days: Option<i64>,

    /// Count expired records without deleting them
    #[arg(long)]
    pub dry_run: bool,
}

impl AuditSweepArgs {
    /// Execute the audit-sweep command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        if let Some(days) = self.retention_days {
            if !(1..=MAX_RETENTION_DAYS).contains(&days) {
                println!("❌ --retention-days must be between 1 and {MAX_RETENTION_DAYS}");
                return Ok(EXIT_CONFIG);
            }
        }

        let (config, services) = match connect(config_path).await {
            Ok(connected) => connected,
            Err(code) => return Ok(code),
        };
        let retention_days = self.retention_days.unwrap_or(config.audit.retention_days);

        tracing::info!(
            retention_days = retention_days,
            dry_run = self.dry_run,
            "Starting audit retention sweep"
        );

        let summary = match services
            .audit
            .retention_sweep(&Principal::system(), retention_days, Utc::now(), self.dry_run)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Audit retention sweep failed");
                println!("❌ Audit retention sweep failed");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("🧹 Audit retention sweep");
        println!();
        println!("  Cutoff:   {}", summary.cutoff.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  Examined: {}", summary.examined);
        println!("  Expired:  {}", summary.expired);
        if summary.dry_run {
            println!("  Deleted:  0 (dry run)");
        } else {
            println!("  Deleted:  {}", summary.deleted);
        }
        println!();

        Ok(EXIT_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_zero_retention() {
        let args = AuditSweepArgs {
            retention_days: Some(0),
            dry_run: true,
        };
        assert_eq!(args.execute("unused.toml").await.unwrap(), EXIT_CONFIG);
    }

    #[tokio::test]
    async fn test_rejects_retention_past_calendar_start() {
        let args = AuditSweepArgs {
            retention_days: Some(1_000_000_000_000_000),
            dry_run: true,
        };
        assert_eq!(args.execute("unused.toml").await.unwrap(), EXIT_CONFIG);
    }
}
