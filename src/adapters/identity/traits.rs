//! Identity provider abstraction

use crate::domain::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Account to create in the user pool
#[derive(Debug, Clone)]
pub struct NewIdentityUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub temporary_password: String,
}

/// Tokens issued by a successful authentication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: u64,
    pub token_type: String,
}

/// User as seen by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityUser {
    pub username: String,
    pub attributes: HashMap<String, String>,
}

impl IdentityUser {
    pub fn email(&self) -> Option<&str> {
        self.attributes.get("email").map(String::as_str)
    }
}

/// Managed user pool operations
///
/// Group names carry roles; see [`Role::group_name`](crate::domain::Role::group_name).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short provider name for logs
    fn provider_name(&self) -> &'static str;

    /// Create an account with a temporary password
    ///
    /// # Errors
    ///
    /// [`IdentityError::UserExists`](crate::domain::IdentityError::UserExists)
    /// when the username is taken.
    async fn create_user(&self, user: &NewIdentityUser) -> Result<()>;

    async fn add_user_to_group(&self, username: &str, group: &str) -> Result<()>;

    async fn remove_user_from_group(&self, username: &str, group: &str) -> Result<()>;

    async fn list_groups_for_user(&self, username: &str) -> Result<Vec<String>>;

    /// Set a password; `permanent = false` forces a change at next sign-in
    async fn set_user_password(&self, username: &str, password: &str, permanent: bool)
        -> Result<()>;

    async fn disable_user(&self, username: &str) -> Result<()>;

    async fn enable_user(&self, username: &str) -> Result<()>;

    async fn delete_user(&self, username: &str) -> Result<()>;

    /// Username/password sign-in
    async fn initiate_auth(&self, username: &str, password: &str) -> Result<AuthTokens>;

    /// Resolve an access token to its user
    async fn get_user(&self, access_token: &str) -> Result<IdentityUser>;

    /// Revoke every token of the user owning `access_token`
    async fn sign_out(&self, access_token: &str) -> Result<()>;
}
