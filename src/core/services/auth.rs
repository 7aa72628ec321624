//! Sign-in and token resolution

use super::audit::AuditService;
use crate::adapters::identity::{AuthTokens, IdentityProvider};
use crate::adapters::store::Repositories;
use crate::core::access::Principal;
use crate::domain::{AuditEvent, AuditEventType, IdentityError, Result, TrialError, User};
use std::sync::Arc;

/// An authenticated caller and the tokens issued for it
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub tokens: AuthTokens,
}

#[derive(Clone)]
pub struct AuthService {
    repos: Repositories,
    audit: AuditService,
    identity: Arc<dyn IdentityProvider>,
}

impl AuthService {
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

    /// Signs in with username and password
    ///
    /// # Errors
    ///
    /// Returns [`TrialError::Unauthorized`] for rejected credentials, unknown
    /// users and disabled accounts. Each failure is audited as `LoginFailure`.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Session> {
        let tokens = match self.identity.initiate_auth(username, password).await {
            Ok(tokens) => tokens,
            Err(TrialError::Identity(IdentityError::AuthenticationFailed(reason))) => {
                return Err(self.login_failed(username, None, &reason).await);
            }
            Err(e) => {
                crate::log_error_with_context!(e, "sign-in against identity provider");
                return Err(e);
            }
        };

        let user = match self.stored_user(username).await? {
            Some(user) if user.enabled => user,
            refused => {
                return Err(self
                    .refuse_session(username, &tokens.access_token, refused.as_ref())
                    .await);
            }
        };

        let principal = Principal::from_user(&user);

        tracing::info!(username = %user.username, role = %user.role, "Login succeeded");

        self.audit
            .log(
                AuditEvent::new(
                    AuditEventType::LoginSuccess,
                    "user",
                    format!("{} signed in", user.username),
                )
                .actor(Some(user.id.clone()), user.role)
                .target(&user.id)
                .organization(user.organization_id.clone()),
            )
            .await?;

        Ok(Session { principal, tokens })
    }

    /// Resolves an access token to the caller it was issued to
    ///
    /// A token whose stored user is missing or disabled is revoked and the
    /// attempt is audited as `LoginFailure`.
    pub async fn resolve(&self, access_token: &str) -> Result<Principal> {
        let identity_user = match self.identity.get_user(access_token).await {
            Ok(user) => user,
            Err(TrialError::Identity(
                IdentityError::AuthenticationFailed(reason) | IdentityError::UserNotFound(reason),
            )) => return Err(TrialError::Unauthorized(reason)),
            Err(e) => return Err(e),
        };

        match self.stored_user(&identity_user.username).await? {
            Some(user) if user.enabled => Ok(Principal::from_user(&user)),
            refused => Err(self
                .refuse_session(&identity_user.username, access_token, refused.as_ref())
                .await),
        }
    }

    /// Revokes the tokens of the session owning `access_token`
    pub async fn logout(&self, access_token: &str) -> Result<()> {
        let principal = self.resolve(access_token).await?;
        self.identity.sign_out(access_token).await?;

        tracing::info!(username = %principal.username, "Logged out");

        let mut event = AuditEvent::new(
            AuditEventType::Logout,
            "user",
            format!("{} signed out", principal.username),
        )
        .actor(principal.user_id.clone(), principal.role)
        .organization(principal.organization_id.clone());
        if let Some(ref id) = principal.user_id {
            event = event.target(id);
        }
        self.audit.log(event).await?;
        Ok(())
    }

    async fn stored_user(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .repos
            .users
            .find_by(&[("username", username)])
            .await?
            .into_iter()
            .next())
    }

    /// Revokes a session the identity provider issued to a user the
    /// application refuses, then audits the failure
    async fn refuse_session(
        &self,
        username: &str,
        access_token: &str,
        refused: Option<&User>,
    ) -> TrialError {
        if let Err(e) = self.identity.sign_out(access_token).await {
            tracing::warn!(username = %username, error = %e, "Failed to revoke refused session");
        }
        let reason = if refused.is_some() {
            "account disabled"
        } else {
            "no application user for account"
        };
        self.login_failed(username, refused, reason).await
    }

    /// Audits a failed sign-in and returns the error for the caller
    async fn login_failed(
        &self,
        username: &str,
        user: Option<&User>,
        reason: &str,
    ) -> TrialError {
        tracing::warn!(username = %username, reason = reason, "Login failed");

        let mut event = AuditEvent::new(
            AuditEventType::LoginFailure,
            "user",
            format!("Failed sign-in for {username}: {reason}"),
        );
        if let Some(user) = user {
            event = event
                .actor(Some(user.id.clone()), user.role)
                .target(&user.id)
                .organization(user.organization_id.clone());
        }

        match self.audit.log(event).await {
            Ok(_) => TrialError::Unauthorized("invalid credentials".to_string()),
            Err(e) => e,
        }
    }
}
