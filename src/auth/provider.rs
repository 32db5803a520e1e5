//! Identity provider boundary
//!
//! The session manager talks to the identity service only through
//! [`IdentityProvider`], so production code can use the Cognito client and
//! tests can script replies. Wire types follow Cognito's `InitiateAuth`
//! JSON 1.1 shapes.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tokens::{TokenSet, DEFAULT_EXPIRES_IN_SECS};

/// Credentials offered to the identity provider.
pub enum Grant {
    Password { username: String, password: String },
    Refresh { refresh_token: String },
}

impl Grant {
    pub fn flow(&self) -> &'static str {
        match self {
            Grant::Password { .. } => "USER_PASSWORD_AUTH",
            Grant::Refresh { .. } => "REFRESH_TOKEN_AUTH",
        }
    }
}

/// Failure to get any answer out of the identity provider.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to reach identity provider: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to encode identity request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outcome of one exchange with the identity provider.
#[derive(Debug, Clone)]
pub enum ProviderReply {
    Authenticated(AuthenticationResult),
    /// The provider wants an interactive step (e.g. `NEW_PASSWORD_REQUIRED`).
    Challenge { name: String },
    /// Non-success response, with the HTTP status and the provider's
    /// message and error type.
    Rejected {
        status: u16,
        message: Option<String>,
        kind: Option<String>,
    },
}

pub trait IdentityProvider: Send + Sync {
    fn initiate_auth<'a>(
        &'a self,
        grant: &'a Grant,
    ) -> BoxFuture<'a, Result<ProviderReply, TransportError>>;
}

/// `InitiateAuth` request body
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitiateAuthRequest<'a> {
    pub auth_flow: &'static str,
    pub client_id: &'a str,
    pub auth_parameters: AuthParameters<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum AuthParameters<'a> {
    Password {
        #[serde(rename = "USERNAME")]
        username: &'a str,
        #[serde(rename = "PASSWORD")]
        password: &'a str,
    },
    Refresh {
        #[serde(rename = "REFRESH_TOKEN")]
        refresh_token: &'a str,
    },
}

impl<'a> InitiateAuthRequest<'a> {
    pub fn new(client_id: &'a str, grant: &'a Grant) -> Self {
        let auth_parameters = match grant {
            Grant::Password { username, password } => AuthParameters::Password {
                username: username.as_str(),
                password: password.as_str(),
            },
            Grant::Refresh { refresh_token } => AuthParameters::Refresh {
                refresh_token: refresh_token.as_str(),
            },
        };
        Self {
            auth_flow: grant.flow(),
            client_id,
            auth_parameters,
        }
    }
}

/// `InitiateAuth` response body (success, challenge and error envelopes share it)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitiateAuthResponse {
    pub authentication_result: Option<AuthenticationResult>,
    pub challenge_name: Option<String>,
    #[serde(rename = "message")]
    pub message: Option<String>,
    #[serde(rename = "__type")]
    pub error_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResult {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl AuthenticationResult {
    /// Turn provider token material into a complete [`TokenSet`].
    ///
    /// `prior_refresh` stands in when the provider does not rotate the
    /// refresh token. Returns the reason when material is missing.
    pub fn into_token_set(
        self,
        prior_refresh: Option<&str>,
        now_millis: i64,
    ) -> Result<TokenSet, String> {
        let non_empty = |s: Option<String>| s.filter(|v| !v.is_empty());

        let id_token = non_empty(self.id_token).ok_or("Authentication failed: no id token returned")?;
        let access_token =
            non_empty(self.access_token).ok_or("Authentication failed: no access token returned")?;
        let refresh_token = non_empty(self.refresh_token)
            .or_else(|| prior_refresh.filter(|v| !v.is_empty()).map(String::from))
            .ok_or("Authentication failed: no refresh token returned")?;

        Ok(TokenSet::issue(
            id_token,
            access_token,
            refresh_token,
            self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            now_millis,
        ))
    }
}

impl ProviderReply {
    /// A rejection caused by the provider itself rather than the credentials.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ProviderReply::Rejected { status, .. } if *status >= 500)
    }
}

/// Classify a raw provider response by HTTP status and body.
///
/// An unparseable body on a success status is treated as a success without
/// tokens, which the caller reports as a malformed response.
pub fn classify(status: u16, body: &str) -> ProviderReply {
    let parsed: InitiateAuthResponse = serde_json::from_str(body).unwrap_or_default();

    if !(200..300).contains(&status) {
        return ProviderReply::Rejected {
            status,
            message: parsed.message.filter(|m| !m.is_empty()),
            kind: parsed.error_type.filter(|t| !t.is_empty()),
        };
    }

    if let Some(name) = parsed.challenge_name {
        return ProviderReply::Challenge { name };
    }

    ProviderReply::Authenticated(parsed.authentication_result.unwrap_or_default())
}
