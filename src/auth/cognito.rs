//! Cognito `InitiateAuth` client
//!
//! Posts the password and refresh grants to the user pool's regional
//! endpoint using the JSON 1.1 protocol.

use futures::future::{BoxFuture, FutureExt};

use super::provider::{classify, Grant, IdentityProvider, InitiateAuthRequest, ProviderReply, TransportError};
use super::AuthConfig;

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";

pub struct CognitoProvider {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
}

impl CognitoProvider {
    pub fn new(auth_config: &AuthConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: auth_config.endpoint(),
            client_id: auth_config.client_id.clone(),
        }
    }

    async fn send(&self, grant: &Grant) -> Result<ProviderReply, TransportError> {
        let body = serde_json::to_vec(&InitiateAuthRequest::new(&self.client_id, grant))?;

        tracing::debug!("InitiateAuth {} at {}", grant.flow(), self.endpoint);

        let resp = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", INITIATE_AUTH_TARGET)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!("InitiateAuth answered HTTP {}", status.as_u16());
        }

        let text = resp.text().await?;
        Ok(classify(status.as_u16(), &text))
    }
}

impl IdentityProvider for CognitoProvider {
    fn initiate_auth<'a>(
        &'a self,
        grant: &'a Grant,
    ) -> BoxFuture<'a, Result<ProviderReply, TransportError>> {
        self.send(grant).boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::net::TcpListener;

    use super::*;
    use crate::auth::{AuthError, SessionManager, SystemClock};
    use crate::config::storage::testing::MemoryStore;
    use crate::testing::{http_client, serve, split_request};

    fn provider(base: &str) -> CognitoProvider {
        let config = AuthConfig {
            client_id: "client-1".into(),
            region: "us-east-2".into(),
            endpoint: Some(format!("{}/", base)),
        };
        CognitoProvider::new(&config, http_client())
    }

    fn password_grant() -> Grant {
        Grant::Password {
            username: "admin@example.com".into(),
            password: "correct-pw".into(),
        }
    }

    #[test]
    fn test_new_targets_regional_endpoint() {
        let config = AuthConfig {
            client_id: "client-1".into(),
            region: "us-east-2".into(),
            endpoint: None,
        };
        let provider = CognitoProvider::new(&config, reqwest::Client::new());
        assert_eq!(provider.endpoint, "https://cognito-idp.us-east-2.amazonaws.com/");
        assert_eq!(provider.client_id, "client-1");
    }

    #[tokio::test]
    async fn test_password_grant_request_and_success() {
        let (base, server) = serve(vec![(
            200,
            r#"{"AuthenticationResult":{"IdToken":"i","AccessToken":"a","RefreshToken":"r","ExpiresIn":3600}}"#,
        )])
        .await;

        let reply = provider(&base).initiate_auth(&password_grant()).await.unwrap();
        match reply {
            ProviderReply::Authenticated(result) => {
                assert_eq!(result.id_token.as_deref(), Some("i"));
                assert_eq!(result.refresh_token.as_deref(), Some("r"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        let requests = server.await.unwrap();
        let (head, body) = split_request(&requests[0]);
        assert!(head.starts_with("post / "));
        assert!(head.contains("content-type: application/x-amz-json-1.1"));
        assert!(head.contains("x-amz-target: awscognitoidentityproviderservice.initiateauth"));

        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["AuthFlow"], "USER_PASSWORD_AUTH");
        assert_eq!(body["ClientId"], "client-1");
        assert_eq!(body["AuthParameters"]["USERNAME"], "admin@example.com");
        assert_eq!(body["AuthParameters"]["PASSWORD"], "correct-pw");
    }

    #[tokio::test]
    async fn test_error_envelope_is_rejected() {
        let (base, server) = serve(vec![(
            400,
            r#"{"__type":"NotAuthorizedException","message":"Incorrect username or password."}"#,
        )])
        .await;

        let reply = provider(&base).initiate_auth(&password_grant()).await.unwrap();
        assert!(!reply.is_server_error());
        match reply {
            ProviderReply::Rejected {
                status,
                message,
                kind,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message.as_deref(), Some("Incorrect username or password."));
                assert_eq!(kind.as_deref(), Some("NotAuthorizedException"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_rejected_with_status() {
        let (base, server) = serve(vec![(
            500,
            r#"{"__type":"InternalErrorException","message":"Internal server error"}"#,
        )])
        .await;

        let reply = provider(&base).initiate_auth(&password_grant()).await.unwrap();
        assert!(reply.is_server_error());
        assert!(matches!(
            reply,
            ProviderReply::Rejected { status: 500, message: Some(m), .. } if m == "Internal server error"
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_challenge_reply() {
        let (base, server) = serve(vec![(
            200,
            r#"{"ChallengeName":"NEW_PASSWORD_REQUIRED","Session":"s","ChallengeParameters":{}}"#,
        )])
        .await;

        let reply = provider(&base).initiate_auth(&password_grant()).await.unwrap();
        assert!(matches!(
            reply,
            ProviderReply::Challenge { name } if name == "NEW_PASSWORD_REQUIRED"
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_in_server_error_reports_provider_message() {
        let (base, server) = serve(vec![(
            500,
            r#"{"__type":"InternalErrorException","message":"Internal server error"}"#,
        )])
        .await;
        let session = SessionManager::new(
            Arc::new(provider(&base)),
            Arc::new(MemoryStore::default()),
            Arc::new(SystemClock),
        );

        let err = session
            .sign_in("admin@example.com", "correct-pw")
            .await
            .unwrap_err();
        assert!(
            matches!(&err, AuthError::InvalidCredentials(msg) if msg == "Internal server error"),
            "unexpected error: {:?}",
            err
        );
        assert!(!session.is_authenticated());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = provider(&format!("http://{}", addr))
            .initiate_auth(&password_grant())
            .await;
        assert!(matches!(result, Err(TransportError::Http(_))));
    }
}
