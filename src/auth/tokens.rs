//! Token set and expiry bookkeeping

use serde::{Deserialize, Serialize};

/// Seconds shaved off the provider's TTL so a token accepted here is still
/// accepted by the backend when the request lands.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// TTL assumed when the provider omits `ExpiresIn`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// The credentials of one signed-in session.
///
/// Serialized as the durable session record, with `expiry` as absolute epoch
/// milliseconds so it survives restarts without re-deriving elapsed time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expiry: i64,
}

impl TokenSet {
    /// Build a token set issued at `now_millis` with the provider's TTL.
    pub fn issue(
        id_token: String,
        access_token: String,
        refresh_token: String,
        expires_in_secs: u64,
        now_millis: i64,
    ) -> Self {
        let ttl_millis = i64::try_from(expires_in_secs)
            .unwrap_or(i64::MAX)
            .saturating_sub(EXPIRY_MARGIN_SECS)
            .saturating_mul(1000);
        Self {
            id_token,
            access_token,
            refresh_token,
            expiry: now_millis.saturating_add(ttl_millis),
        }
    }

    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        now_millis < self.expiry
    }

    /// All three credentials present. A record failing this is never used.
    pub fn is_complete(&self) -> bool {
        !self.id_token.is_empty() && !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

// Hand-written so credentials never end up in logs.
impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("id_token", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    /// Current time as epoch milliseconds.
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
