//! Application users backed by the identity provider
//!
//! Every user exists twice: as an account in the user pool, where the role
//! is carried by group membership, and as a stored [`User`] record holding
//! the organization scope. The service keeps both in step.

use super::audit::AuditService;
use crate::adapters::identity::{IdentityProvider, NewIdentityUser};
use crate::adapters::store::Repositories;
use crate::config::{secret_string, SecretString};
use crate::core::access::{Permission, Principal};
use crate::domain::{
    AuditEvent, AuditEventType, ChangeSet, IdentityError, OrganizationId, Result, Role,
    TrialError, User, UserId,
};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use secrecy::ExposeSecret;
use std::sync::Arc;

const TEMPORARY_PASSWORD_LENGTH: usize = 16;

/// Input for [`UserService::create`]
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub organization_id: Option<OrganizationId>,
    /// Generated when absent
    pub temporary_password: Option<SecretString>,
}

/// A created user and the temporary password to hand over
#[derive(Debug)]
pub struct CreatedUser {
    pub user: User,
    pub temporary_password: SecretString,
}

#[derive(Clone)]
pub struct UserService {
    repos: Repositories,
    audit: AuditService,
    identity: Arc<dyn IdentityProvider>,
}

impl UserService {
    pub fn new(
        repos: Repositories,
        audit: AuditService,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            repos,
            audit,
            identity,
        }
    }

    /// Creates the pool account, its role group and the stored record
    ///
    /// The pool account is removed again when a later step fails.
    pub async fn create(&self, principal: &Principal, new: NewUser) -> Result<CreatedUser> {
        self.audit
            .check(
                principal,
                Permission::WriteUser,
                new.organization_id.as_ref(),
                "user",
            )
            .await?;
        self.guard_role(principal, new.role, new.organization_id.as_ref())
            .await?;

        let username = new.username.trim().to_string();
        if username.is_empty() {
            return Err(TrialError::Validation("username cannot be empty".to_string()));
        }
        if !new.email.contains('@') {
            return Err(TrialError::Validation(format!(
                "invalid email address '{}'",
                new.email
            )));
        }
        if new.role.is_global() != new.organization_id.is_none() {
            return Err(TrialError::Validation(format!(
                "role {} {} an organization",
                new.role,
                if new.role.is_global() {
                    "must not have"
                } else {
                    "requires"
                }
            )));
        }
        if let Some(ref org) = new.organization_id {
            self.repos.organizations.require(org.as_str()).await?;
        }
        if !self
            .repos
            .users
            .find_by(&[("username", username.as_str())])
            .await?
            .is_empty()
        {
            return Err(TrialError::Conflict(format!(
                "username {username} is already taken"
            )));
        }

        let temporary_password = new
            .temporary_password
            .unwrap_or_else(|| secret_string(generate_temporary_password()));

        self.identity
            .create_user(&NewIdentityUser {
                username: username.clone(),
                email: new.email.clone(),
                full_name: new.full_name.clone(),
                temporary_password: temporary_password.expose_secret().to_string(),
            })
            .await?;

        let now = Utc::now();
        let user = User {
            id: UserId::generate(),
            username,
            email: new.email,
            full_name: new.full_name,
            role: new.role,
            organization_id: new.organization_id,
            enabled: true,
            created_at: now,
            updated_at: now,
        };

        let stored = async {
            self.identity
                .add_user_to_group(&user.username, user.role.group_name())
                .await?;
            self.repos.users.insert(&user).await
        }
        .await;
        if let Err(e) = stored {
            if let Err(rollback) = self.identity.delete_user(&user.username).await {
                tracing::warn!(
                    username = %user.username,
                    error = %rollback,
                    "Failed to remove pool account after aborted user creation"
                );
            }
            return Err(e);
        }

        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            role = %user.role,
            "User created"
        );

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::UserCreated,
                    "user",
                    format!("Created user {} with role {}", user.username, user.role),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&user.id)
                .organization(user.organization_id.clone()),
            )
            .await?;

        Ok(CreatedUser {
            user,
            temporary_password,
        })
    }

    pub async fn get(&self, principal: &Principal, id: &UserId) -> Result<User> {
        let user = self.repos.users.require(id.as_str()).await?;
        self.audit
            .check(
                principal,
                Permission::ReadUser,
                user.organization_id.as_ref(),
                "user",
            )
            .await?;
        Ok(user)
    }

    /// Every user for super admins, the caller's organization otherwise
    pub async fn list(&self, principal: &Principal) -> Result<Vec<User>> {
        self.audit
            .check(
                principal,
                Permission::ReadUser,
                principal.organization_id.as_ref(),
                "user",
            )
            .await?;

        let mut users = if principal.is_super_admin() {
            self.repos.users.list().await?
        } else {
            match principal.organization_id {
                Some(ref org) => {
                    self.repos
                        .users
                        .find_by(&[("organization_id", org.as_str())])
                        .await?
                }
                None => Vec::new(),
            }
        };
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    /// Moves the user to another role group
    pub async fn change_role(
        &self,
        principal: &Principal,
        id: &UserId,
        role: Role,
    ) -> Result<User> {
        let mut user = self
            .load_for_write(principal, id, Permission::WriteUser)
            .await?;
        self.guard_role(principal, role, user.organization_id.as_ref())
            .await?;
        if user.role == role {
            return Ok(user);
        }
        if role.is_global() != user.organization_id.is_none() {
            return Err(TrialError::Validation(format!(
                "role {role} does not fit the organization scope of {}",
                user.username
            )));
        }

        self.identity
            .remove_user_from_group(&user.username, user.role.group_name())
            .await?;
        self.identity
            .add_user_to_group(&user.username, role.group_name())
            .await?;

        let mut changes = ChangeSet::new();
        changes.track("role", &user.role, &role);
        user.role = role;
        user.updated_at = Utc::now();
        self.repos.users.save(&user).await?;

        tracing::info!(user_id = %user.id, role = %role, "User role changed");

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::RoleChanged,
                    "user",
                    format!("Changed role of {} to {role}", user.username),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&user.id)
                .changes(changes.into_changes())
                .organization(user.organization_id.clone()),
            )
            .await?;

        Ok(user)
    }

    pub async fn set_enabled(
        &self,
        principal: &Principal,
        id: &UserId,
        enabled: bool,
    ) -> Result<User> {
        let mut user = self.load_for_write(principal, id, Permission::WriteUser).await?;
        if user.enabled == enabled {
            return Ok(user);
        }

        if enabled {
            self.identity.enable_user(&user.username).await?;
        } else {
            self.identity.disable_user(&user.username).await?;
        }

        let mut changes = ChangeSet::new();
        changes.track("enabled", &user.enabled, &enabled);
        user.enabled = enabled;
        user.updated_at = Utc::now();
        self.repos.users.save(&user).await?;

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::UserUpdated,
                    "user",
                    format!(
                        "{} user {}",
                        if enabled { "Enabled" } else { "Disabled" },
                        user.username
                    ),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&user.id)
                .changes(changes.into_changes())
                .organization(user.organization_id.clone()),
            )
            .await?;

        Ok(user)
    }

    /// Sets a temporary password the user must change at next sign-in
    pub async fn reset_password(
        &self,
        principal: &Principal,
        id: &UserId,
        password: Option<SecretString>,
    ) -> Result<SecretString> {
        let user = self.load_for_write(principal, id, Permission::WriteUser).await?;
        let password = password.unwrap_or_else(|| secret_string(generate_temporary_password()));

        self.identity
            .set_user_password(&user.username, password.expose_secret().as_ref(), false)
            .await?;

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::PasswordReset,
                    "user",
                    format!("Reset password of {}", user.username),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(&user.id)
                .organization(user.organization_id.clone()),
            )
            .await?;

        Ok(password)
    }

    /// Removes the pool account and the stored record
    ///
    /// # Errors
    ///
    /// Returns [`TrialError::Conflict`] when a user tries to delete themself.
    pub async fn delete(&self, principal: &Principal, id: &UserId) -> Result<()> {
        let user = self
            .load_for_write(principal, id, Permission::DeleteUser)
            .await?;
        if principal.user_id.as_ref() == Some(id) {
            return Err(TrialError::Conflict(
                "users cannot delete their own account".to_string(),
            ));
        }

        match self.identity.delete_user(&user.username).await {
            Ok(()) | Err(TrialError::Identity(IdentityError::UserNotFound(_))) => {}
            Err(e) => return Err(e),
        }
        self.repos.users.delete(id.as_str()).await?;

        tracing::info!(user_id = %id, username = %user.username, "User deleted");

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::UserDeleted,
                    "user",
                    format!("Deleted user {}", user.username),
                )
                .actor(principal.user_id.clone(), principal.role)
                .target(id)
                .organization(user.organization_id.clone()),
            )
            .await?;

        Ok(())
    }

    async fn load_for_write(
        &self,
        principal: &Principal,
        id: &UserId,
        permission: Permission,
    ) -> Result<User> {
        let user = self.repos.users.require(id.as_str()).await?;
        self.audit
            .check(principal, permission, user.organization_id.as_ref(), "user")
            .await?;
        self.guard_role(principal, user.role, user.organization_id.as_ref())
            .await?;
        Ok(user)
    }

    /// Only super admins may create or manage global roles
    async fn guard_role(
        &self,
        principal: &Principal,
        role: Role,
        scope: Option<&OrganizationId>,
    ) -> Result<()> {
        if role.is_global() && !principal.is_super_admin() {
            let denied = TrialError::Forbidden(format!(
                "role {} may not manage {role} users",
                principal.role
            ));
            return Err(self.audit.deny(principal, scope, "user", denied).await);
        }
        Ok(())
    }
}

/// Random password with upper, lower, digit and symbol characters
fn generate_temporary_password() -> String {
    const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
    const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
    const DIGITS: &[u8] = b"23456789";
    const SYMBOLS: &[u8] = b"!@#$%^&*-_=+";

    let mut rng = rand::thread_rng();
    let classes = [UPPER, LOWER, DIGITS, SYMBOLS];
    let all: Vec<u8> = classes.concat();

    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while chars.len() < TEMPORARY_PASSWORD_LENGTH {
        chars.push(all[rng.gen_range(0..all.len())]);
    }
    chars.shuffle(&mut rng);
    chars.into_iter().map(char::from).collect()
}
