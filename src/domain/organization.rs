//! Organization domain model
//!
//! An organization is a trial site. Every patient, survey, visit and
//! non-global user belongs to exactly one organization, which is the tenant
//! boundary enforced by the access layer.

use super::ids::{OrganizationId, StudyId};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Kind of site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Hospital,
    Clinic,
    ResearchCenter,
    Laboratory,
}

/// Operational status of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

/// Postal address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
}

/// A participating trial site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    /// Short unique site code, upper case
    pub code: String,
    pub organization_type: OrganizationType,
    #[serde(default)]
    pub address: Option<Address>,
    /// Maximum number of concurrently active patients (0 = unlimited)
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub status: OrganizationStatus,
    #[serde(default)]
    pub study_ids: Vec<StudyId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Creates a new builder for constructing an Organization
    pub fn builder() -> OrganizationBuilder {
        OrganizationBuilder::default()
    }

    /// Whether the site can take part in new enrollments
    pub fn is_active(&self) -> bool {
        self.status == OrganizationStatus::Active
    }

    /// Whether the site participates in the given study
    pub fn participates_in(&self, study_id: &StudyId) -> bool {
        self.study_ids.contains(study_id)
    }
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9-]{2,20}$").expect("static regex"))
}

/// Normalizes and validates a site code
///
/// # Errors
///
/// Returns an error unless the code is 2-20 characters of `A-Z`, `0-9` or `-`
pub fn normalize_code(code: &str) -> Result<String, String> {
    let code = code.trim().to_uppercase();
    if !code_pattern().is_match(&code) {
        return Err(format!(
            "Invalid organization code '{code}': expected 2-20 characters of A-Z, 0-9 or '-'"
        ));
    }
    Ok(code)
}

/// Builder for constructing Organization instances
#[derive(Debug, Default)]
pub struct OrganizationBuilder {
    id: Option<OrganizationId>,
    name: Option<String>,
    code: Option<String>,
    organization_type: Option<OrganizationType>,
    address: Option<Address>,
    capacity: u32,
    equipment: Vec<String>,
    certifications: Vec<String>,
}

impl OrganizationBuilder {
    /// Creates a new OrganizationBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit id (a fresh one is generated otherwise)
    pub fn id(mut self, id: OrganizationId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn organization_type(mut self, organization_type: OrganizationType) -> Self {
        self.organization_type = Some(organization_type);
        self
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn equipment(mut self, equipment: Vec<String>) -> Self {
        self.equipment = equipment;
        self
    }

    pub fn certifications(mut self, certifications: Vec<String>) -> Self {
        self.certifications = certifications;
        self
    }

    /// Builds the Organization
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or the code is malformed
    pub fn build(self) -> Result<Organization, String> {
        let name = self.name.ok_or("name is required")?;
        if name.trim().is_empty() {
            return Err("name cannot be empty".to_string());
        }
        let code = normalize_code(&self.code.ok_or("code is required")?)?;
        let now = Utc::now();

        Ok(Organization {
            id: self.id.unwrap_or_else(OrganizationId::generate),
            name: name.trim().to_string(),
            code,
            organization_type: self
                .organization_type
                .ok_or("organization_type is required")?,
            address: self.address,
            capacity: self.capacity,
            equipment: self.equipment,
            certifications: self.certifications,
            status: OrganizationStatus::Active,
            study_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_normalizes_code() {
        let org = Organization::builder()
            .name("  St. Mary Hospital ")
            .code("stm-01")
            .organization_type(OrganizationType::Hospital)
            .build()
            .unwrap();

        assert_eq!(org.code, "STM-01");
        assert_eq!(org.name, "St. Mary Hospital");
        assert!(org.is_active());
        assert!(org.study_ids.is_empty());
    }

    #[test]
    fn test_builder_missing_type() {
        let result = Organization::builder().name("Lab").code("LAB").build();
        assert_eq!(result.unwrap_err(), "organization_type is required");
    }

    #[test]
    fn test_invalid_codes() {
        assert!(normalize_code("A").is_err());
        assert!(normalize_code("HAS SPACE").is_err());
        assert!(normalize_code("THIS-CODE-IS-FAR-TOO-LONG").is_err());
        assert_eq!(normalize_code(" ab12 ").unwrap(), "AB12");
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&OrganizationStatus::Suspended).unwrap();
        assert_eq!(json, "\"suspended\"");
        let t: OrganizationType = serde_json::from_str("\"research_center\"").unwrap();
        assert_eq!(t, OrganizationType::ResearchCenter);
    }
}
