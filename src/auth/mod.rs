//! Authentication module for the Pixorus admin API
//!
//! Signs in against the Cognito user pool with the `USER_PASSWORD_AUTH`
//! flow, keeps the resulting token set in memory and on disk, and refreshes
//! it with `REFRESH_TOKEN_AUTH` when it expires.

pub mod cognito;
pub mod commands;
pub mod jwt;
pub mod provider;
pub mod session;
pub mod tokens;

use thiserror::Error;

pub use cognito::CognitoProvider;
pub use commands::{login, logout, print_token, status};
pub use provider::TransportError;
pub use session::SessionManager;
pub use tokens::{SystemClock, TokenSet};

/// Cognito app client configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// App client ID (public client, no secret)
    pub client_id: String,
    /// AWS region hosting the user pool
    pub region: String,
    /// Replaces the regional Cognito endpoint (local stacks, tests)
    pub endpoint: Option<String>,
}

impl AuthConfig {
    /// `InitiateAuth` endpoint: the override, else the region's
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://cognito-idp.{}.amazonaws.com/", self.region),
        }
    }
}

/// Why a sign-in did not produce a session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error(
        "Sign-in requires the {challenge} step, which this client does not support. Please contact an administrator."
    )]
    ChallengeRequired { challenge: String },
    #[error("{0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Network(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uses_region() {
        let config = AuthConfig {
            client_id: "abc".into(),
            region: "eu-west-1".into(),
            endpoint: None,
        };
        assert_eq!(config.endpoint(), "https://cognito-idp.eu-west-1.amazonaws.com/");

        let local = AuthConfig {
            endpoint: Some("http://127.0.0.1:9229/".into()),
            ..config
        };
        assert_eq!(local.endpoint(), "http://127.0.0.1:9229/");
    }

    #[test]
    fn test_challenge_message_points_to_admin() {
        let err = AuthError::ChallengeRequired {
            challenge: "NEW_PASSWORD_REQUIRED".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("NEW_PASSWORD_REQUIRED"));
        assert!(msg.contains("administrator"));
    }
}
