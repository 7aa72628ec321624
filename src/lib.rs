// Trialsite - Clinical trial site management backend
// Copyright (c) 2025 Trialsite Contributors
// Licensed under the MIT License

//! # Trialsite - Clinical trial site management
//!
//! Trialsite is the backend for running clinical studies across sites: it
//! keeps organizations, patients, studies, surveys (one patient in one
//! study), visits and users, and records every change in a tamper-evident
//! audit trail.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface for maintenance and reporting
//! - [`core`] - Access control, visit scheduling, services and reports
//! - [`adapters`] - Document stores (memory, PostgreSQL) and identity providers
//! - [`domain`] - Domain entities, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and audit log macros
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use trialsite::adapters::store::{create_document_store, create_identity_provider};
//! use trialsite::config::load_config;
//! use trialsite::core::access::Principal;
//! use trialsite::core::services::Services;
//! use trialsite::domain::StudyId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("trialsite.toml")?;
//!     let services = Services::new(
//!         create_document_store(&config).await?,
//!         create_identity_provider(&config)?,
//!         &config,
//!     );
//!
//!     let deviations = services
//!         .visits
//!         .detect_for_study(
//!             &Principal::system(),
//!             &StudyId::new("study-1")?,
//!             NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
//!         )
//!         .await?;
//!
//!     println!("{} deviations", deviations.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Visit Scheduling
//!
//! Enrolling a patient plans one visit per study visit template, each with a
//! target date and an inclusive window around it:
//!
//! ```rust
//! use chrono::NaiveDate;
//! use trialsite::core::scheduling::VisitWindow;
//!
//! let target = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
//! let window = VisitWindow::around(target, 3, 3).unwrap();
//! assert!(window.contains(NaiveDate::from_ymd_opt(2025, 3, 18).unwrap()));
//! assert!(!window.contains(NaiveDate::from_ymd_opt(2025, 3, 19).unwrap()));
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`], whose error is
//! [`domain::TrialError`].
//!
//! ## Logging
//!
//! Trialsite uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(study_id = "study-1", "Starting deviation scan");
//! warn!(visit_number = 3, "Visit rescheduled outside its window");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
