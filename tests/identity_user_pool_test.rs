//! User pool client against a mocked identity endpoint

use mockito::{Matcher, Server};
use serde_json::json;
use trialsite::adapters::identity::{
    secret_hash, IdentityProvider, NewIdentityUser, UserPoolClient,
};
use trialsite::config::{secret_string, IdentityConfig, IdentityProviderKind, RetryConfig};
use trialsite::domain::{IdentityError, TrialError};

const TARGET_HEADER: &str = "x-amz-target";

fn config(endpoint: String, client_secret: Option<&str>) -> IdentityConfig {
    IdentityConfig {
        provider: IdentityProviderKind::UserPool,
        endpoint: Some(endpoint),
        region: Some("eu-west-1".to_string()),
        user_pool_id: Some("eu-west-1_test".to_string()),
        client_id: Some("client-123".to_string()),
        client_secret: client_secret.map(|s| secret_string(s.to_string())),
        timeout_seconds: 5,
        retry: RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        },
    }
}

fn target(action: &str) -> String {
    format!("AWSCognitoIdentityProviderService.{action}")
}

#[tokio::test]
async fn test_initiate_auth_returns_tokens() {
    let mut server = Server::new_async().await;
    let expected_hash = secret_hash("s3cret", "jdoe", "client-123");
    let mock = server
        .mock("POST", "/")
        .match_header(TARGET_HEADER, target("InitiateAuth").as_str())
        .match_header("content-type", "application/x-amz-json-1.1")
        .match_body(Matcher::PartialJson(json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": "client-123",
            "AuthParameters": {
                "USERNAME": "jdoe",
                "PASSWORD": "hunter22",
                "SECRET_HASH": expected_hash,
            }
        })))
        .with_status(200)
        .with_body(
            json!({
                "AuthenticationResult": {
                    "AccessToken": "access-abc",
                    "IdToken": "id-abc",
                    "RefreshToken": "refresh-abc",
                    "ExpiresIn": 3600,
                    "TokenType": "Bearer"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = UserPoolClient::new(config(server.url(), Some("s3cret"))).unwrap();
    let tokens = client.initiate_auth("jdoe", "hunter22").await.unwrap();

    assert_eq!(tokens.access_token, "access-abc");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-abc"));
    assert_eq!(tokens.expires_in, 3600);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_credentials() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header(TARGET_HEADER, target("InitiateAuth").as_str())
        .with_status(400)
        .with_body(
            json!({
                "__type": "NotAuthorizedException",
                "message": "Incorrect username or password."
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = UserPoolClient::new(config(server.url(), None)).unwrap();
    let err = client.initiate_auth("jdoe", "wrong").await.unwrap_err();

    assert!(matches!(
        err,
        TrialError::Identity(IdentityError::AuthenticationFailed(_))
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_new_password_challenge_is_refused() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(
            json!({ "ChallengeName": "NEW_PASSWORD_REQUIRED", "Session": "opaque" }).to_string(),
        )
        .create_async()
        .await;

    let client = UserPoolClient::new(config(server.url(), None)).unwrap();
    let err = client.initiate_auth("jdoe", "temporary1").await.unwrap_err();
    assert!(err.to_string().contains("NEW_PASSWORD_REQUIRED"));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header(TARGET_HEADER, target("AdminDisableUser").as_str())
        .with_status(503)
        .with_body(json!({ "__type": "InternalErrorException", "message": "busy" }).to_string())
        .expect(3)
        .create_async()
        .await;

    let client = UserPoolClient::new(config(server.url(), None)).unwrap();
    let err = client.disable_user("jdoe").await.unwrap_err();

    assert!(matches!(
        err,
        TrialError::Identity(IdentityError::ServerError { status: 503, .. })
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_user_and_groups() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/")
        .match_header(TARGET_HEADER, target("AdminCreateUser").as_str())
        .match_body(Matcher::PartialJson(json!({
            "UserPoolId": "eu-west-1_test",
            "Username": "jdoe",
            "MessageAction": "SUPPRESS"
        })))
        .with_status(200)
        .with_body(json!({ "User": { "Username": "jdoe" } }).to_string())
        .create_async()
        .await;
    let groups = server
        .mock("POST", "/")
        .match_header(TARGET_HEADER, target("AdminListGroupsForUser").as_str())
        .with_status(200)
        .with_body(
            json!({ "Groups": [{ "GroupName": "coordinator" }, { "GroupName": "monitor" }] })
                .to_string(),
        )
        .create_async()
        .await;

    let client = UserPoolClient::new(config(server.url(), None)).unwrap();
    client
        .create_user(&NewIdentityUser {
            username: "jdoe".to_string(),
            email: "jdoe@example.org".to_string(),
            full_name: "J. Doe".to_string(),
            temporary_password: "Temp-pass-123".to_string(),
        })
        .await
        .unwrap();

    let names = client.list_groups_for_user("jdoe").await.unwrap();
    assert_eq!(names, vec!["coordinator".to_string(), "monitor".to_string()]);

    create.assert_async().await;
    groups.assert_async().await;
}

#[tokio::test]
async fn test_get_user_reads_attributes() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .match_header(TARGET_HEADER, target("GetUser").as_str())
        .match_body(Matcher::PartialJson(json!({ "AccessToken": "access-abc" })))
        .with_status(200)
        .with_body(
            json!({
                "Username": "jdoe",
                "UserAttributes": [
                    { "Name": "email", "Value": "jdoe@example.org" },
                    { "Name": "name", "Value": "J. Doe" }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = UserPoolClient::new(config(server.url(), None)).unwrap();
    let user = client.get_user("access-abc").await.unwrap();
    assert_eq!(user.username, "jdoe");
    assert_eq!(user.email(), Some("jdoe@example.org"));
}

#[tokio::test]
async fn test_unknown_user_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(400)
        .with_body(
            json!({
                "__type": "com.amazonaws.cognito.identity.idp#UserNotFoundException",
                "message": "User does not exist."
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = UserPoolClient::new(config(server.url(), None)).unwrap();
    let err = client.delete_user("ghost").await.unwrap_err();
    assert!(matches!(
        err,
        TrialError::Identity(IdentityError::UserNotFound(_))
    ));
    mock.assert_async().await;
}
