//! User pool client speaking the Cognito JSON protocol
//!
//! Every operation is a `POST` to the service endpoint with the action named
//! in the `X-Amz-Target` header and a JSON body
//! (`Content-Type: application/x-amz-json-1.1`). Errors come back as a JSON
//! object whose `__type` names the exception.

use super::traits::{AuthTokens, IdentityProvider, IdentityUser, NewIdentityUser};
use crate::config::IdentityConfig;
use crate::domain::{IdentityError, Result, TrialError};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::{Client, ClientBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Computes the `SECRET_HASH` parameter:
/// base64(HMAC-SHA256(client_secret, username + client_id))
pub fn secret_hash(client_secret: &str, username: &str, client_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Maps a service exception name to an [`IdentityError`]
fn map_error(status: StatusCode, error_type: &str, message: String) -> IdentityError {
    // `__type` may be namespaced: "com.amazonaws...#UserNotFoundException"
    let name = error_type.rsplit('#').next().unwrap_or(error_type);
    match name {
        "NotAuthorizedException" | "PasswordResetRequiredException" | "UserNotConfirmedException" => {
            IdentityError::AuthenticationFailed(message)
        }
        "UserNotFoundException" => IdentityError::UserNotFound(message),
        "UsernameExistsException" | "AliasExistsException" => IdentityError::UserExists(message),
        "InvalidPasswordException" => IdentityError::InvalidPassword(message),
        "TooManyRequestsException" | "LimitExceededException" => IdentityError::ServerError {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            message,
        },
        _ if status.is_server_error() => IdentityError::ServerError {
            status: status.as_u16(),
            message,
        },
        _ => IdentityError::InvalidResponse(format!("{name}: {message}")),
    }
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeType {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResponse {
    username: String,
    #[serde(default)]
    user_attributes: Vec<AttributeType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroupType {
    group_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListGroupsResponse {
    #[serde(default)]
    groups: Vec<GroupType>,
}

/// HTTP client for a managed user pool
///
/// # Example
///
/// ```no_run
/// use trialsite::adapters::identity::{IdentityProvider, UserPoolClient};
/// use trialsite::config::{IdentityConfig, IdentityProviderKind};
///
/// # async fn example() -> trialsite::domain::Result<()> {
/// let config = IdentityConfig {
///     provider: IdentityProviderKind::UserPool,
///     endpoint: Some("https://cognito-idp.eu-west-1.amazonaws.com".to_string()),
///     user_pool_id: Some("eu-west-1_AbCdEf".to_string()),
///     client_id: Some("4j8k2example".to_string()),
///     ..Default::default()
/// };
/// let client = UserPoolClient::new(config)?;
/// let tokens = client.initiate_auth("jdoe", "correct horse").await?;
/// # Ok(())
/// # }
/// ```
pub struct UserPoolClient {
    endpoint: String,
    user_pool_id: String,
    client_id: String,
    client: Client,
    config: IdentityConfig,
}

impl UserPoolClient {
    /// Create a new user pool client
    ///
    /// # Errors
    ///
    /// Returns an error if endpoint, pool id or client id are missing, or the
    /// HTTP client cannot be built.
    pub fn new(config: IdentityConfig) -> Result<Self> {
        let required = |value: &Option<String>, name: &str| {
            value.clone().filter(|v| !v.is_empty()).ok_or_else(|| {
                TrialError::Configuration(format!("identity.{name} is required for the user pool"))
            })
        };
        let endpoint = required(&config.endpoint, "endpoint")?;
        let user_pool_id = required(&config.user_pool_id, "user_pool_id")?;
        let client_id = required(&config.client_id, "client_id")?;

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                TrialError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            endpoint,
            user_pool_id,
            client_id,
            client,
            config,
        })
    }

    fn secret_hash_for(&self, username: &str) -> Option<String> {
        self.config
            .client_secret
            .as_ref()
            .map(|secret| secret_hash(secret.expose_secret().as_ref(), username, &self.client_id))
    }

    /// Sends one action request without retrying
    async fn send(&self, action: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IdentityError::Timeout(e.to_string())
                } else {
                    IdentityError::ConnectionFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Object(Default::default()));
            }
            return serde_json::from_str(&text)
                .map_err(|e| IdentityError::InvalidResponse(e.to_string()).into());
        }

        let error = serde_json::from_str::<ServiceError>(&text).unwrap_or(ServiceError {
            error_type: String::new(),
            message: text,
        });
        Err(map_error(status, &error.error_type, error.message).into())
    }

    /// Sends an action with exponential backoff on retryable failures
    async fn call(&self, action: &str, body: Value) -> Result<Value> {
        let max_retries = self.config.retry.max_retries;
        let mut attempt = 0;

        loop {
            match self.send(action, &body).await {
                Ok(value) => return Ok(value),
                Err(TrialError::Identity(e)) if e.is_retryable() => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(e.into());
                    }

                    let delay_ms = self.config.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        action = action,
                        attempt = attempt,
                        max_retries = max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "Retrying identity request after error"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn admin_user_action(&self, action: &str, username: &str) -> Result<()> {
        self.call(
            action,
            json!({ "UserPoolId": self.user_pool_id, "Username": username }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for UserPoolClient {
    fn provider_name(&self) -> &'static str {
        "user_pool"
    }

    async fn create_user(&self, user: &NewIdentityUser) -> Result<()> {
        self.call(
            "AdminCreateUser",
            json!({
                "UserPoolId": self.user_pool_id,
                "Username": user.username,
                "TemporaryPassword": user.temporary_password,
                "MessageAction": "SUPPRESS",
                "UserAttributes": [
                    { "Name": "email", "Value": user.email },
                    { "Name": "email_verified", "Value": "true" },
                    { "Name": "name", "Value": user.full_name },
                ],
            }),
        )
        .await?;

        tracing::info!(username = %user.username, "Created user pool account");
        Ok(())
    }

    async fn add_user_to_group(&self, username: &str, group: &str) -> Result<()> {
        self.call(
            "AdminAddUserToGroup",
            json!({ "UserPoolId": self.user_pool_id, "Username": username, "GroupName": group }),
        )
        .await?;
        Ok(())
    }

    async fn remove_user_from_group(&self, username: &str, group: &str) -> Result<()> {
        self.call(
            "AdminRemoveUserFromGroup",
            json!({ "UserPoolId": self.user_pool_id, "Username": username, "GroupName": group }),
        )
        .await?;
        Ok(())
    }

    async fn list_groups_for_user(&self, username: &str) -> Result<Vec<String>> {
        let value = self
            .call(
                "AdminListGroupsForUser",
                json!({ "UserPoolId": self.user_pool_id, "Username": username }),
            )
            .await?;
        let response: ListGroupsResponse = serde_json::from_value(value)
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
        Ok(response.groups.into_iter().map(|g| g.group_name).collect())
    }

    async fn set_user_password(
        &self,
        username: &str,
        password: &str,
        permanent: bool,
    ) -> Result<()> {
        self.call(
            "AdminSetUserPassword",
            json!({
                "UserPoolId": self.user_pool_id,
                "Username": username,
                "Password": password,
                "Permanent": permanent,
            }),
        )
        .await?;
        Ok(())
    }

    async fn disable_user(&self, username: &str) -> Result<()> {
        self.admin_user_action("AdminDisableUser", username).await
    }

    async fn enable_user(&self, username: &str) -> Result<()> {
        self.admin_user_action("AdminEnableUser", username).await
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        self.admin_user_action("AdminDeleteUser", username).await
    }

    async fn initiate_auth(&self, username: &str, password: &str) -> Result<AuthTokens> {
        let mut parameters = json!({ "USERNAME": username, "PASSWORD": password });
        if let Some(hash) = self.secret_hash_for(username) {
            parameters["SECRET_HASH"] = Value::String(hash);
        }

        let value = self
            .call(
                "InitiateAuth",
                json!({
                    "AuthFlow": "USER_PASSWORD_AUTH",
                    "ClientId": self.client_id,
                    "AuthParameters": parameters,
                }),
            )
            .await?;

        let response: InitiateAuthResponse = serde_json::from_value(value)
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        match (response.authentication_result, response.challenge_name) {
            (Some(result), _) => Ok(AuthTokens {
                access_token: result.access_token,
                id_token: result.id_token,
                refresh_token: result.refresh_token,
                expires_in: result.expires_in,
                token_type: result.token_type,
            }),
            (None, Some(challenge)) => Err(IdentityError::AuthenticationFailed(format!(
                "sign-in requires completing the {challenge} challenge"
            ))
            .into()),
            (None, None) => Err(IdentityError::InvalidResponse(
                "InitiateAuth returned neither tokens nor a challenge".to_string(),
            )
            .into()),
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<IdentityUser> {
        let value = self
            .call("GetUser", json!({ "AccessToken": access_token }))
            .await?;
        let response: GetUserResponse = serde_json::from_value(value)
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        let attributes: HashMap<String, String> = response
            .user_attributes
            .into_iter()
            .map(|a| (a.name, a.value))
            .collect();

        Ok(IdentityUser {
            username: response.username,
            attributes,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.call("GlobalSignOut", json!({ "AccessToken": access_token }))
            .await?;
        Ok(())
    }
}
