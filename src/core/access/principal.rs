//! Authenticated caller

use crate::domain::{OrganizationId, Role, User, UserId};
use serde::{Deserialize, Serialize};

/// The identity on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stored user id; `None` for the system principal
    pub user_id: Option<UserId>,
    pub username: String,
    pub role: Role,
    /// Home organization; `None` for global roles
    pub organization_id: Option<OrganizationId>,
}

impl Principal {
    pub fn new(
        user_id: Option<UserId>,
        username: impl Into<String>,
        role: Role,
        organization_id: Option<OrganizationId>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            role,
            organization_id,
        }
    }

    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: Some(user.id.clone()),
            username: user.username.clone(),
            role: user.role,
            organization_id: user.organization_id.clone(),
        }
    }

    /// Unscoped super-admin identity for maintenance jobs
    pub fn system() -> Self {
        Self::new(None, "system", Role::SuperAdmin, None)
    }

    pub fn is_super_admin(&self) -> bool {
        self.role.is_global()
    }

    /// Whether the principal may act inside `organization_id`
    pub fn can_access(&self, organization_id: &OrganizationId) -> bool {
        self.is_super_admin() || self.organization_id.as_ref() == Some(organization_id)
    }
}
