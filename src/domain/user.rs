//! Application user and role model

use super::ids::{OrganizationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role
///
/// Each role maps 1:1 to a group in the identity provider's user pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator, not bound to an organization
    SuperAdmin,
    /// Manages one site's users, patients and settings
    OrgAdmin,
    /// Principal or sub-investigator at a site
    Investigator,
    /// Study coordinator handling enrollment and scheduling
    Coordinator,
    /// Performs visits and examinations
    Clinician,
    /// Sponsor monitor / auditor with read access to audit trails
    Monitor,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::SuperAdmin,
        Role::OrgAdmin,
        Role::Investigator,
        Role::Coordinator,
        Role::Clinician,
        Role::Monitor,
        Role::Viewer,
    ];

    /// Group name in the identity provider
    pub fn group_name(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::OrgAdmin => "org_admin",
            Role::Investigator => "investigator",
            Role::Coordinator => "coordinator",
            Role::Clinician => "clinician",
            Role::Monitor => "monitor",
            Role::Viewer => "viewer",
        }
    }

    /// Resolves a role from an identity-provider group name
    pub fn from_group_name(group: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|r| r.group_name() == group)
    }

    /// Whether the role operates across all organizations
    pub fn is_global(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group_name())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_group_name(&s.to_lowercase().replace('-', "_"))
            .ok_or_else(|| format!("Unknown role: {s}"))
    }
}

/// A user of the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Username in the identity provider
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    /// Home organization; `None` only for global roles
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}
