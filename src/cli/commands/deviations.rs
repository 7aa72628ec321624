//! Deviations command implementation
//!
//! Scans every survey of a study and lists protocol deviations as of a date.

use super::connect;
use crate::cli::{exit_code_for, EXIT_CONFIG, EXIT_FINDINGS, EXIT_OK};
use crate::core::access::Principal;
use crate::core::scheduling::{DeviationSeverity, ProtocolDeviation};
use crate::domain::StudyId;
use chrono::{NaiveDate, Utc};
use clap::Args;

/// Arguments for the deviations command
#[derive(Args, Debug)]
pub struct DeviationsArgs {
    /// Study to scan
    #[arg(long)]
    pub study: String,

    /// Reference date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Print deviations as JSON
    #[arg(long)]
    pub json: bool,
}

impl DeviationsArgs {
    /// Execute the deviations command
    ///
    /// Exits with 1 when any deviation is found.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let study_id = match StudyId::new(self.study.clone()) {
            Ok(id) => id,
            Err(e) => {
                println!("❌ Invalid study id: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let as_of = self.as_of.unwrap_or_else(|| Utc::now().date_naive());

        tracing::info!(study_id = %study_id, as_of = %as_of, "Starting deviation scan");

        let (_config, services) = match connect(config_path).await {
            Ok(connected) => connected,
            Err(code) => return Ok(code),
        };

        let deviations = match services
            .visits
            .detect_for_study(&Principal::system(), &study_id, as_of)
            .await
        {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, study_id = %study_id, "Deviation scan failed");
                println!("❌ Deviation scan failed");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&deviations)?);
        } else {
            print_table(&study_id, as_of, &deviations);
        }

        Ok(if deviations.is_empty() {
            EXIT_OK
        } else {
            EXIT_FINDINGS
        })
    }
}

fn print_table(study_id: &StudyId, as_of: NaiveDate, deviations: &[ProtocolDeviation]) {
    println!("🔎 Protocol deviations for study {study_id} as of {as_of}");
    println!();

    if deviations.is_empty() {
        println!("✅ No deviations found");
        return;
    }

    let major = deviations
        .iter()
        .filter(|d| d.severity == DeviationSeverity::Major)
        .count();

    for deviation in deviations {
        let marker = match deviation.severity {
            DeviationSeverity::Major => "MAJOR",
            DeviationSeverity::Minor => "minor",
        };
        println!(
            "  [{marker}] survey {} visit {:>2} {:<18} {}",
            deviation.survey_id,
            deviation.visit_number,
            deviation.kind.as_str(),
            deviation.description
        );
    }
    println!();
    println!("⚠️  {} deviation(s), {major} major", deviations.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_study_without_surveys_has_no_findings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlocal_enabled = false").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let args = DeviationsArgs {
            study: "missing-study".to_string(),
            as_of: None,
            json: false,
        };
        assert_eq!(args.execute(&path).await.unwrap(), EXIT_OK);
    }

    #[tokio::test]
    async fn test_missing_config() {
        let args = DeviationsArgs {
            study: "s".to_string(),
            as_of: None,
            json: true,
        };
        assert_eq!(args.execute("/nonexistent.toml").await.unwrap(), EXIT_CONFIG);
    }
}
