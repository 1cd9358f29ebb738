//! Process-wide token store.
//!
//! The store holds the current [`TokenPair`] behind an `ArcSwapOption`, so a
//! write replaces the whole pair with a single atomic pointer swap and readers
//! never observe a half-updated value. Claims are decoded lazily, at most once
//! per stored pair.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use hearth_core::{Clock, SystemClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::claims::{Claims, decode};

/// Access/refresh token pair as issued by the server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

fn redact(token: &str) -> String {
    if token.is_empty() {
        "<empty>".to_string()
    } else {
        format!("[REDACTED, {} chars]", token.len())
    }
}

/// A stored pair plus its lazily decoded claims.
struct StoredSession {
    pair: TokenPair,
    claims: OnceLock<Option<Claims>>,
}

impl StoredSession {
    fn new(pair: TokenPair) -> Self {
        Self {
            pair,
            claims: OnceLock::new(),
        }
    }

    fn claims(&self) -> Option<&Claims> {
        self.claims
            .get_or_init(|| {
                if self.pair.access_token.is_empty() {
                    return None;
                }
                match decode(&self.pair.access_token) {
                    Ok(claims) => Some(claims),
                    Err(e) => {
                        warn!(error = %e, "Discarding undecodable access token");
                        None
                    }
                }
            })
            .as_ref()
    }
}

/// Holder of the current session tokens.
///
/// Only [`TokenStore::set`], [`TokenStore::set_if_current`] and
/// [`TokenStore::clear`] mutate it; everything else is a read of the current
/// snapshot. Every write bumps the store generation.
pub struct TokenStore {
    current: ArcSwapOption<StoredSession>,
    /// Serializes writers; readers go through `current` only.
    generation: Mutex<u64>,
    clock: Arc<dyn Clock>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl TokenStore {
    /// Creates an empty store reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            generation: Mutex::new(0),
            clock,
        }
    }

    /// Creates a store seeded with `pair`.
    pub fn with_pair(clock: Arc<dyn Clock>, pair: TokenPair) -> Self {
        let store = Self::new(clock);
        store.set(pair);
        store
    }

    /// Returns a copy of the current pair.
    pub fn get(&self) -> Option<TokenPair> {
        self.current.load().as_deref().map(|s| s.pair.clone())
    }

    /// Replaces the whole pair.
    pub fn set(&self, pair: TokenPair) {
        let mut generation = self.generation.lock();
        *generation += 1;
        debug!(generation = *generation, "Replacing session token pair");
        self.current.store(Some(Arc::new(StoredSession::new(pair))));
    }

    /// Replaces the whole pair only if nothing was written since
    /// `generation` was read. Returns `false` if the pair was left as is.
    pub fn set_if_current(&self, generation: u64, pair: TokenPair) -> bool {
        let mut current = self.generation.lock();
        if *current != generation {
            return false;
        }
        *current += 1;
        debug!(generation = *current, "Replacing session token pair");
        self.current.store(Some(Arc::new(StoredSession::new(pair))));
        true
    }

    /// Removes the pair.
    pub fn clear(&self) {
        let mut generation = self.generation.lock();
        *generation += 1;
        debug!(generation = *generation, "Clearing session token pair");
        self.current.store(None);
    }

    /// Number of writes so far.
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Returns `true` if a pair is stored.
    pub fn is_present(&self) -> bool {
        self.current.load().is_some()
    }

    /// Decoded claims of the current access token.
    ///
    /// `None` when no pair is stored or the access token is empty or
    /// undecodable.
    pub fn claims(&self) -> Option<Claims> {
        self.current
            .load()
            .as_deref()
            .and_then(|s| s.claims().cloned())
    }

    /// Returns `true` when there is no usable access token.
    pub fn is_expired(&self) -> bool {
        let now = self.clock.now_millis();
        self.claims().is_none_or(|c| c.is_expired_at(now))
    }

    /// Returns `true` when the access token is missing, expired, or expires
    /// within `margin`.
    pub fn needs_renewal(&self, margin: Duration) -> bool {
        let now = self.clock.now_millis();
        self.claims().is_none_or(|c| c.needs_renewal_at(now, margin))
    }

    /// Access token to present on authenticated requests.
    ///
    /// Only returned while it decodes and has not expired.
    pub fn bearer(&self) -> Option<String> {
        let guard = self.current.load();
        let session = guard.as_deref()?;
        let claims = session.claims()?;
        if claims.is_expired_at(self.clock.now_millis()) {
            return None;
        }
        Some(session.pair.access_token.clone())
    }

    /// Access token regardless of expiry, if it decodes.
    ///
    /// Logout presents the token even when it has expired.
    pub fn access_token(&self) -> Option<String> {
        let guard = self.current.load();
        let session = guard.as_deref()?;
        session.claims()?;
        Some(session.pair.access_token.clone())
    }

    /// Non-empty refresh token of the current pair.
    pub fn refresh_token(&self) -> Option<String> {
        self.current
            .load()
            .as_deref()
            .map(|s| s.pair.refresh_token.clone())
            .filter(|t| !t.is_empty())
    }
}
