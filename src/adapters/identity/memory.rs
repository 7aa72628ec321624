//! In-process identity provider for development and tests

use super::traits::{AuthTokens, IdentityProvider, IdentityUser, NewIdentityUser};
use crate::domain::{IdentityError, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Minimum password length accepted by [`MemoryIdentityProvider`]
pub const MIN_PASSWORD_LENGTH: usize = 8;

const TOKEN_LIFETIME_SECONDS: u64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    email: String,
    full_name: String,
    password: String,
    enabled: bool,
    groups: BTreeSet<String>,
}

#[derive(Default)]
struct PoolState {
    accounts: HashMap<String, Account>,
    // access token -> username
    sessions: HashMap<String, String>,
}

/// User pool kept in memory
///
/// Passwords are compared in plain text; never use outside development.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    state: RwLock<PoolState>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the account exists and is enabled
    pub async fn is_enabled(&self, username: &str) -> Option<bool> {
        self.state
            .read()
            .await
            .accounts
            .get(username)
            .map(|a| a.enabled)
    }
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::InvalidPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        ))
        .into());
    }
    Ok(())
}

fn not_found(username: &str) -> crate::domain::TrialError {
    IdentityError::UserNotFound(username.to_string()).into()
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn create_user(&self, user: &NewIdentityUser) -> Result<()> {
        check_password(&user.temporary_password)?;
        let mut state = self.state.write().await;
        if state.accounts.contains_key(&user.username) {
            return Err(IdentityError::UserExists(user.username.clone()).into());
        }
        state.accounts.insert(
            user.username.clone(),
            Account {
                email: user.email.clone(),
                full_name: user.full_name.clone(),
                password: user.temporary_password.clone(),
                enabled: true,
                groups: BTreeSet::new(),
            },
        );
        Ok(())
    }

    async fn add_user_to_group(&self, username: &str, group: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(username)
            .ok_or_else(|| not_found(username))?;
        account.groups.insert(group.to_string());
        Ok(())
    }

    async fn remove_user_from_group(&self, username: &str, group: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(username)
            .ok_or_else(|| not_found(username))?;
        account.groups.remove(group);
        Ok(())
    }

    async fn list_groups_for_user(&self, username: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let account = state
            .accounts
            .get(username)
            .ok_or_else(|| not_found(username))?;
        Ok(account.groups.iter().cloned().collect())
    }

    async fn set_user_password(
        &self,
        username: &str,
        password: &str,
        _permanent: bool,
    ) -> Result<()> {
        check_password(password)?;
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(username)
            .ok_or_else(|| not_found(username))?;
        account.password = password.to_string();
        Ok(())
    }

    async fn disable_user(&self, username: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .accounts
            .get_mut(username)
            .ok_or_else(|| not_found(username))?
            .enabled = false;
        state.sessions.retain(|_, owner| owner != username);
        Ok(())
    }

    async fn enable_user(&self, username: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .accounts
            .get_mut(username)
            .ok_or_else(|| not_found(username))?
            .enabled = true;
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .accounts
            .remove(username)
            .ok_or_else(|| not_found(username))?;
        state.sessions.retain(|_, owner| owner != username);
        Ok(())
    }

    async fn initiate_auth(&self, username: &str, password: &str) -> Result<AuthTokens> {
        let mut state = self.state.write().await;
        let authenticated = state
            .accounts
            .get(username)
            .is_some_and(|a| a.enabled && a.password == password);
        if !authenticated {
            // Same message for unknown users and bad passwords
            return Err(IdentityError::AuthenticationFailed(
                "Incorrect username or password".to_string(),
            )
            .into());
        }

        let access_token = format!("mem-{}", Uuid::new_v4());
        state
            .sessions
            .insert(access_token.clone(), username.to_string());

        Ok(AuthTokens {
            access_token,
            id_token: None,
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_in: TOKEN_LIFETIME_SECONDS,
            token_type: "Bearer".to_string(),
        })
    }

    async fn get_user(&self, access_token: &str) -> Result<IdentityUser> {
        let state = self.state.read().await;
        let username = state.sessions.get(access_token).ok_or_else(|| {
            IdentityError::AuthenticationFailed("Access token is invalid or revoked".to_string())
        })?;
        let account = state
            .accounts
            .get(username)
            .ok_or_else(|| not_found(username))?;

        let attributes = HashMap::from([
            ("email".to_string(), account.email.clone()),
            ("name".to_string(), account.full_name.clone()),
        ]);
        Ok(IdentityUser {
            username: username.clone(),
            attributes,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let username = state.sessions.get(access_token).cloned().ok_or_else(|| {
            IdentityError::AuthenticationFailed("Access token is invalid or revoked".to_string())
        })?;
        state.sessions.retain(|_, owner| *owner != username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrialError;

    fn new_user(username: &str) -> NewIdentityUser {
        NewIdentityUser {
            username: username.to_string(),
            email: format!("{username}@site.example"),
            full_name: "Jane Doe".to_string(),
            temporary_password: "Temp-Pass-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let idp = MemoryIdentityProvider::new();
        idp.create_user(&new_user("jdoe")).await.unwrap();

        let tokens = idp.initiate_auth("jdoe", "Temp-Pass-1").await.unwrap();
        let user = idp.get_user(&tokens.access_token).await.unwrap();
        assert_eq!(user.username, "jdoe");
        assert_eq!(user.email(), Some("jdoe@site.example"));
    }

    #[tokio::test]
    async fn test_duplicate_user() {
        let idp = MemoryIdentityProvider::new();
        idp.create_user(&new_user("jdoe")).await.unwrap();
        let err = idp.create_user(&new_user("jdoe")).await.unwrap_err();
        assert!(matches!(
            err,
            TrialError::Identity(IdentityError::UserExists(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_and_disabled_user() {
        let idp = MemoryIdentityProvider::new();
        idp.create_user(&new_user("jdoe")).await.unwrap();
        assert!(idp.initiate_auth("jdoe", "wrong-pass").await.is_err());

        idp.disable_user("jdoe").await.unwrap();
        assert!(idp.initiate_auth("jdoe", "Temp-Pass-1").await.is_err());
        assert_eq!(idp.is_enabled("jdoe").await, Some(false));
    }

    #[tokio::test]
    async fn test_groups() {
        let idp = MemoryIdentityProvider::new();
        idp.create_user(&new_user("jdoe")).await.unwrap();
        idp.add_user_to_group("jdoe", "clinician").await.unwrap();
        idp.add_user_to_group("jdoe", "monitor").await.unwrap();
        idp.remove_user_from_group("jdoe", "clinician").await.unwrap();
        assert_eq!(
            idp.list_groups_for_user("jdoe").await.unwrap(),
            vec!["monitor".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sign_out_revokes_tokens() {
        let idp = MemoryIdentityProvider::new();
        idp.create_user(&new_user("jdoe")).await.unwrap();
        let tokens = idp.initiate_auth("jdoe", "Temp-Pass-1").await.unwrap();
        idp.sign_out(&tokens.access_token).await.unwrap();
        assert!(idp.get_user(&tokens.access_token).await.is_err());
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let idp = MemoryIdentityProvider::new();
        let mut user = new_user("jdoe");
        user.temporary_password = "short".to_string();
        assert!(matches!(
            idp.create_user(&user).await,
            Err(TrialError::Identity(IdentityError::InvalidPassword(_)))
        ));
    }
}
