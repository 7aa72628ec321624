//! Role-based, organization-scoped access control
//!
//! Every service operation names the [`Permission`] it needs and, when the
//! target belongs to a site, the organization it belongs to. Super admins
//! pass the scope check everywhere; every other role is confined to its
//! home organization.
//!
//! ```rust
//! use trialsite::core::access::{authorize, Permission, Principal};
//! use trialsite::domain::{OrganizationId, Role};
//!
//! let site = OrganizationId::new("org-1").unwrap();
//! let other = OrganizationId::new("org-2").unwrap();
//! let coordinator = Principal::new(None, "cc", Role::Coordinator, Some(site.clone()));
//!
//! assert!(authorize(&coordinator, Permission::WritePatient, Some(&site)).is_ok());
//! assert!(authorize(&coordinator, Permission::WritePatient, Some(&other)).is_err());
//! assert!(authorize(&coordinator, Permission::RunRetention, None).is_err());
//! ```

pub mod permissions;
pub mod principal;

pub use permissions::Permission;
pub use principal::Principal;

use crate::domain::{OrganizationId, Result, TrialError};

/// Checks that `principal` holds `permission` inside `scope`
///
/// # Errors
///
/// Returns [`TrialError::Forbidden`] when the role lacks the permission or
/// the scope organization is not the principal's own.
pub fn authorize(
    principal: &Principal,
    permission: Permission,
    scope: Option<&OrganizationId>,
) -> Result<()> {
    if !principal.role.has_permission(permission) {
        crate::log_access_denied!(principal, permission, "role lacks permission");
        return Err(TrialError::Forbidden(format!(
            "role {} may not {:?}",
            principal.role, permission
        )));
    }

    if let Some(organization_id) = scope {
        if !principal.can_access(organization_id) {
            crate::log_access_denied!(principal, permission, "outside organization");
            return Err(TrialError::Forbidden(format!(
                "{} may not access organization {}",
                principal.username, organization_id
            )));
        }
    }

    Ok(())
}
