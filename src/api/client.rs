//! HTTP client for the storefront API
//!
//! Wraps reqwest::Client; privileged calls carry the id token from the
//! session manager in the `Authorization` header.

use anyhow::{bail, Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::auth::SessionManager;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct StoreClient {
    http: reqwest::Client,
    api_base: String,
    session: SessionManager,
}

impl StoreClient {
    pub fn new(http: reqwest::Client, api_base: &str, session: SessionManager) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Send a JSON request and decode the JSON response.
    ///
    /// When a privileged request's token is refused, the session is refreshed
    /// and the request retried once. A second refusal clears the session.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        require_auth: bool,
    ) -> Result<T> {
        let url = self.url(path);

        let mut token = None;
        if require_auth {
            token = self.session.get_valid_token().await?;
            if token.is_none() {
                tracing::warn!("No valid session; sending {} {} without a token", method, url);
            }
        }

        let mut resp = self.send(&method, &url, body, token.as_deref()).await?;
        if resp.status() == StatusCode::UNAUTHORIZED && token.is_some() {
            tracing::info!("Token refused for {} {}; refreshing session", method, url);
            if let Some(fresh) = self.session.refresh().await {
                resp = self.send(&method, &url, body, Some(&fresh)).await?;
                if resp.status() == StatusCode::UNAUTHORIZED {
                    tracing::warn!("Refreshed token refused as well; clearing session");
                    self.session.clear_session();
                }
            }
        }

        let resp = check_response(resp, &url).await?;
        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response> {
        tracing::debug!("{} {}", method, url);

        let mut req = self
            .http
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        req.send()
            .await
            .with_context(|| format!("{} {} failed", method, url))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, require_auth: bool) -> Result<T> {
        self.request(Method::GET, path, None, require_auth).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        require_auth: bool,
    ) -> Result<T> {
        self.request(Method::POST, path, Some(body), require_auth).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        self.request(Method::PUT, path, Some(body), true).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, None, true).await
    }

    /// Upload raw bytes to a presigned URL. No session token is sent.
    pub async fn put_object(&self, upload_url: &str, content_type: &str, bytes: Vec<u8>) -> Result<()> {
        tracing::debug!("PUT presigned object ({} bytes)", bytes.len());
        let resp = self
            .http
            .put(upload_url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .context("Image upload failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("Image upload failed (HTTP {})", status.as_u16());
        }
        Ok(())
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        bail!(
            "401 Unauthorized for {}. Session is missing or revoked -- run 'pixorus-cli login'.",
            url
        );
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{}", error_message(status, &body));
    }
    Ok(resp)
}

/// Message for a failed API call: the body's `error` field when present.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| format!("Request failed: {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::future::{self, BoxFuture, FutureExt};

    use super::*;
    use crate::auth::provider::{
        AuthenticationResult, Grant, IdentityProvider, ProviderReply, TransportError,
    };
    use crate::auth::SystemClock;
    use crate::config::storage::testing::MemoryStore;
    use crate::testing::{http_client, serve, split_request};

    /// Issues `id-1`, `id-2`, ... for every grant.
    #[derive(Default)]
    struct IssuingProvider {
        issued: AtomicUsize,
    }

    impl IdentityProvider for IssuingProvider {
        fn initiate_auth<'a>(
            &'a self,
            _grant: &'a Grant,
        ) -> BoxFuture<'a, Result<ProviderReply, TransportError>> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            future::ready(Ok(ProviderReply::Authenticated(AuthenticationResult {
                id_token: Some(format!("id-{}", n)),
                access_token: Some(format!("access-{}", n)),
                refresh_token: Some("refresh".into()),
                expires_in: Some(3600),
            })))
            .boxed()
        }
    }

    fn client(api_base: &str) -> (StoreClient, SessionManager, Arc<IssuingProvider>) {
        let provider = Arc::new(IssuingProvider::default());
        let session = SessionManager::new(
            provider.clone(),
            Arc::new(MemoryStore::default()),
            Arc::new(SystemClock),
        );
        let client = StoreClient::new(http_client(), api_base, session.clone());
        (client, session, provider)
    }

    fn authorization(raw: &str) -> Option<String> {
        let (head, _) = split_request(raw);
        head.lines()
            .find_map(|l| l.strip_prefix("authorization:"))
            .map(|v| v.trim().to_string())
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let (client, _, _) = client("https://api.example.com/prod/");
        assert_eq!(
            client.url("/products?activeOnly=true"),
            "https://api.example.com/prod/products?activeOnly=true"
        );
    }

    #[test]
    fn test_error_message_prefers_body() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error":"No valid fields to update"}"#),
            "No valid fields to update"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, "oops"),
            "Request failed: 500"
        );
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#),
            "Request failed: 404"
        );
    }

    #[tokio::test]
    async fn test_refused_token_is_refreshed_and_retried() {
        let (base, server) = serve(vec![(401, r#"{"error":"Unauthorized"}"#), (200, "[]")]).await;
        let (client, session, provider) = client(&base);
        session.sign_in("admin@example.com", "pw").await.unwrap();

        let orders: Vec<serde_json::Value> = client.get("/orders", true).await.unwrap();
        assert!(orders.is_empty());

        let requests = server.await.unwrap();
        assert_eq!(authorization(&requests[0]).as_deref(), Some("id-1"));
        assert_eq!(authorization(&requests[1]).as_deref(), Some("id-2"));
        assert_eq!(provider.issued.load(Ordering::SeqCst), 2);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_repeated_refusal_clears_session() {
        let (base, server) = serve(vec![
            (401, r#"{"error":"Unauthorized"}"#),
            (401, r#"{"error":"Unauthorized"}"#),
        ])
        .await;
        let (client, session, _) = client(&base);
        session.sign_in("admin@example.com", "pw").await.unwrap();

        let err = client
            .get::<Vec<serde_json::Value>>("/orders", true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("login"));
        assert!(!session.is_authenticated());
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unauthenticated_401_leaves_session_alone() {
        let (base, server) = serve(vec![(401, r#"{"error":"Unauthorized"}"#)]).await;
        let (client, _, provider) = client(&base);

        let result = client.get::<Vec<serde_json::Value>>("/orders", true).await;
        assert!(result.is_err());

        let requests = server.await.unwrap();
        assert_eq!(authorization(&requests[0]), None);
        assert_eq!(provider.issued.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_body_is_reported() {
        let (base, server) = serve(vec![(400, r#"{"error":"Name is required"}"#)]).await;
        let (client, _, _) = client(&base);

        let err = client
            .post::<serde_json::Value>("/categories", &serde_json::json!({}), false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Name is required");
        server.await.unwrap();
    }
}
