//! Session manager: token acquisition, caching, expiry and refresh
//!
//! One [`SessionManager`] owns the session of the process. It is a cheap
//! handle over shared state and is passed to whoever needs a token.
//!
//! Lookups go memory, then durable storage, then a refresh. Concurrent
//! refreshes collapse into one provider call: the first caller installs a
//! shared pending future and everyone else awaits the same one.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

use super::provider::{Grant, IdentityProvider, ProviderReply};
use super::tokens::{Clock, TokenSet};
use super::AuthError;
use crate::config::storage::{self, KeyValueStore, StoreError, StoredSession};

/// Storage key of the session record.
pub const DEFAULT_SESSION_KEY: &str = "pixorus_auth";

type RefreshFuture = Shared<BoxFuture<'static, Option<String>>>;

struct PendingRefresh {
    id: u64,
    future: RefreshFuture,
}

#[derive(Default)]
struct State {
    tokens: Option<TokenSet>,
    pending: Option<PendingRefresh>,
    next_refresh_id: u64,
    /// Bumped by sign-in and clear; a refresh that started under an older
    /// epoch must not write its result.
    epoch: u64,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    key: String,
    state: Mutex<State>,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_key(provider, store, clock, DEFAULT_SESSION_KEY)
    }

    pub fn with_key(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                clock,
                key: key.into(),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Exchange a username and password for a fresh session.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<TokenSet, AuthError> {
        tracing::info!("Signing in as {}...", username);

        let grant = Grant::Password {
            username: username.to_string(),
            password: password.to_string(),
        };
        let reply = self.inner.provider.initiate_auth(&grant).await?;

        let result = match reply {
            ProviderReply::Authenticated(result) => result,
            ProviderReply::Challenge { name } => {
                tracing::warn!("Sign-in stopped at {} challenge", name);
                return Err(AuthError::ChallengeRequired { challenge: name });
            }
            ProviderReply::Rejected { message, kind, .. } => {
                let reason = message.or(kind).unwrap_or_else(|| "Login failed".to_string());
                tracing::debug!("Sign-in rejected: {}", reason);
                return Err(AuthError::InvalidCredentials(reason));
            }
        };

        let tokens = result
            .into_token_set(None, self.inner.clock.now_millis())
            .map_err(AuthError::MalformedResponse)?;

        self.inner.install(tokens.clone());
        tracing::info!("Signed in; token valid until {}", tokens.expiry);
        Ok(tokens)
    }

    /// A currently valid id token, refreshing if needed.
    ///
    /// `Ok(None)` means "not signed in". Only a fault reading durable storage
    /// is an error.
    pub async fn get_valid_token(&self) -> Result<Option<String>, StoreError> {
        let now = self.inner.clock.now_millis();

        if let Some(id_token) = self.inner.cached_valid(now) {
            tracing::debug!("Using cached id token");
            return Ok(Some(id_token));
        }

        if let Some(tokens) = self.inner.read_stored()? {
            if tokens.is_valid_at(now) {
                tracing::debug!("Restored session from storage");
                let id_token = tokens.id_token.clone();
                self.inner.lock_state().tokens = Some(tokens);
                return Ok(Some(id_token));
            }
        }

        Ok(self.refresh().await)
    }

    /// Mint a new token set from the stored refresh token.
    ///
    /// Every failure resolves to `None`. Joins a refresh already in flight
    /// instead of starting another.
    pub async fn refresh(&self) -> Option<String> {
        let future = {
            let mut state = self.inner.lock_state();
            match state.pending.as_ref().map(|p| p.future.clone()) {
                Some(future) => {
                    tracing::debug!("Joining in-flight refresh");
                    future
                }
                None => {
                    let id = state.next_refresh_id;
                    state.next_refresh_id += 1;
                    let epoch = state.epoch;

                    let inner = Arc::clone(&self.inner);
                    let future = async move {
                        let result = inner.run_refresh(epoch).await;
                        inner.finish_refresh(id);
                        result
                    }
                    .boxed()
                    .shared();

                    state.pending = Some(PendingRefresh {
                        id,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await
    }

    /// Forget the session in memory and in durable storage.
    pub fn clear_session(&self) {
        {
            let mut state = self.inner.lock_state();
            state.tokens = None;
            state.pending = None;
            state.epoch += 1;
        }
        if let Err(e) = self.inner.store.remove(&self.inner.key) {
            tracing::warn!("Failed to remove stored session: {}", e);
        }
        tracing::info!("Session cleared");
    }

    /// Whether an unexpired token is cached in memory or storage. Never refreshes.
    pub fn is_authenticated(&self) -> bool {
        let now = self.inner.clock.now_millis();
        if self.inner.cached_valid(now).is_some() {
            return true;
        }
        match self.inner.read_stored() {
            Ok(Some(tokens)) => tokens.is_valid_at(now),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Failed to read stored session: {}", e);
                false
            }
        }
    }

    /// The current token set regardless of expiry.
    pub fn snapshot(&self) -> Result<Option<TokenSet>, StoreError> {
        if let Some(tokens) = self.inner.lock_state().tokens.clone() {
            return Ok(Some(tokens));
        }
        self.inner.read_stored()
    }

    pub fn now_millis(&self) -> i64 {
        self.inner.clock.now_millis()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cached_valid(&self, now: i64) -> Option<String> {
        self.lock_state()
            .tokens
            .as_ref()
            .filter(|t| t.is_valid_at(now))
            .map(|t| t.id_token.clone())
    }

    /// Stored token set, with a corrupt record treated as absent.
    fn read_stored(&self) -> Result<Option<TokenSet>, StoreError> {
        match storage::read_session(self.store.as_ref(), &self.key)? {
            StoredSession::Present(tokens) => Ok(Some(tokens)),
            StoredSession::Empty => Ok(None),
            StoredSession::Corrupt(reason) => {
                tracing::warn!("Ignoring corrupt stored session: {}", reason);
                Ok(None)
            }
        }
    }

    /// Replace the session with a freshly signed-in one.
    fn install(&self, tokens: TokenSet) {
        let mut state = self.lock_state();
        state.epoch += 1;
        self.persist_locked(&mut state, tokens);
    }

    fn persist_locked(&self, state: &mut State, tokens: TokenSet) {
        if let Err(e) = storage::write_session(self.store.as_ref(), &self.key, &tokens) {
            tracing::warn!("Failed to persist session: {}", e);
        }
        state.tokens = Some(tokens);
    }

    fn refresh_token(&self) -> Option<String> {
        if let Some(tokens) = &self.lock_state().tokens {
            return Some(tokens.refresh_token.clone());
        }
        match self.read_stored() {
            Ok(stored) => stored.map(|t| t.refresh_token),
            Err(e) => {
                tracing::warn!("Failed to read stored session: {}", e);
                None
            }
        }
    }

    async fn run_refresh(&self, epoch: u64) -> Option<String> {
        let Some(refresh_token) = self.refresh_token() else {
            tracing::debug!("No refresh token available");
            return None;
        };

        tracing::info!("Refreshing identity token...");

        let grant = Grant::Refresh {
            refresh_token: refresh_token.clone(),
        };
        let reply = match self.provider.initiate_auth(&grant).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Token refresh failed: {:#}", e);
                return None;
            }
        };

        // A provider-side failure says nothing about the refresh token.
        if reply.is_server_error() {
            tracing::warn!("Token refresh failed: identity provider error {:?}", reply);
            return None;
        }

        let now = self.clock.now_millis();
        let tokens = match reply {
            ProviderReply::Authenticated(result) => {
                match result.into_token_set(Some(&refresh_token), now) {
                    Ok(tokens) => tokens,
                    Err(reason) => {
                        tracing::warn!("Token refresh returned unusable response: {}", reason);
                        self.drop_session(epoch);
                        return None;
                    }
                }
            }
            ProviderReply::Challenge { name } => {
                tracing::warn!("Token refresh answered with {} challenge", name);
                self.drop_session(epoch);
                return None;
            }
            ProviderReply::Rejected { message, kind, .. } => {
                tracing::warn!(
                    "Refresh token rejected: {}",
                    message.or(kind).unwrap_or_default()
                );
                self.drop_session(epoch);
                return None;
            }
        };

        let mut state = self.lock_state();
        if state.epoch != epoch {
            tracing::debug!("Session changed during refresh; discarding result");
            return state
                .tokens
                .as_ref()
                .filter(|t| t.is_valid_at(now))
                .map(|t| t.id_token.clone());
        }
        let id_token = tokens.id_token.clone();
        self.persist_locked(&mut state, tokens);
        tracing::info!("Token refresh complete");
        Some(id_token)
    }

    /// Clear after the provider refused the refresh token, unless the session
    /// was replaced meanwhile.
    fn drop_session(&self, epoch: u64) {
        let mut state = self.lock_state();
        if state.epoch != epoch {
            return;
        }
        state.tokens = None;
        state.epoch += 1;
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!("Failed to remove stored session: {}", e);
        }
    }

    fn finish_refresh(&self, id: u64) {
        let mut state = self.lock_state();
        if state.pending.as_ref().is_some_and(|p| p.id == id) {
            state.pending = None;
        }
    }
}
