//! Read-only view of id token claims
//!
//! The signature is not checked; the backend does that. This is only for
//! showing who is signed in.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct IdTokenClaims {
    pub sub: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "cognito:username")]
    pub username: Option<String>,
}

pub fn decode_claims(token: &str) -> Result<IdTokenClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .context("id token is not a JWT")?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context("id token payload is not base64url")?;
    serde_json::from_slice(&bytes).context("id token payload is not JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_claims() {
        let token = jwt(r#"{"sub":"u-1","email":"admin@example.com","cognito:username":"admin","exp":1700003600}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.email.as_deref(), Some("admin@example.com"));
        assert_eq!(claims.username.as_deref(), Some("admin"));
        assert_eq!(claims.sub.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_decode_claims_rejects_opaque_token() {
        assert!(decode_claims("opaque-token").is_err());
        assert!(decode_claims("a.!!!.c").is_err());
    }
}
