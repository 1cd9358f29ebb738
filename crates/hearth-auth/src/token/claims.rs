//! Access token claims.
//!
//! Access tokens are JWTs (`header.payload.signature`, base64url without
//! padding). The client holds no verification key, so it only decodes the
//! payload; the server remains the authority on validity.
//!
//! ```ignore
//! use hearth_auth::token::decode;
//!
//! let claims = decode(&access_token)?;
//! if claims.is_expired_at(clock.now_millis()) {
//!     // treat as absent and let the scheduler renew
//! }
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hearth_core::time::{UnixMillis, from_unix_secs};
use hearth_core::{MemberId, NetworkId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

/// Grace period added to `exp` before a token counts as expired.
pub const EXPIRY_SKEW_SECS: i64 = 10;

/// Errors produced while decoding a token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The token is not a decodable JWT or is missing required claims.
    #[error("Invalid token format: {reason}")]
    InvalidTokenFormat {
        /// Why decoding failed.
        reason: String,
    },
}

impl TokenError {
    /// Creates a new `InvalidTokenFormat` error.
    #[must_use]
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidTokenFormat {
            reason: reason.into(),
        }
    }
}

/// Role category of the token subject within the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    Admin,
    Moderator,
    Member,
    Guest,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Typed claims decoded from an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Member the token was issued to.
    pub subject_id: MemberId,

    /// Network the token is scoped to.
    pub network_id: NetworkId,

    /// Role name (for example "Admin"). Empty when not present.
    pub role: String,

    /// Role category.
    pub role_type: RoleType,

    /// Issued at (Unix seconds).
    pub issued_at: i64,

    /// Expiration time (Unix seconds).
    pub expires_at: i64,
}

impl Claims {
    /// Returns `true` once `now_ms` reaches `exp` plus the skew allowance.
    #[must_use]
    pub fn is_expired_at(&self, now_ms: UnixMillis) -> bool {
        now_ms >= self.expiry_deadline_ms()
    }

    /// Returns `true` if the token is expired or expires within `margin`.
    #[must_use]
    pub fn needs_renewal_at(&self, now_ms: UnixMillis, margin: Duration) -> bool {
        let margin_secs = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
        let renew_from = self.expires_at.saturating_sub(margin_secs).saturating_mul(1000);
        now_ms >= renew_from || self.is_expired_at(now_ms)
    }

    /// First millisecond at which the token counts as expired.
    #[must_use]
    pub fn expiry_deadline_ms(&self) -> UnixMillis {
        self.expires_at
            .saturating_add(EXPIRY_SKEW_SECS)
            .saturating_mul(1000)
    }

    /// Issue time as a date, if representable.
    #[must_use]
    pub fn issued_at_datetime(&self) -> Option<OffsetDateTime> {
        from_unix_secs(self.issued_at).ok()
    }

    /// Expiration as a date, if representable.
    #[must_use]
    pub fn expires_at_datetime(&self) -> Option<OffsetDateTime> {
        from_unix_secs(self.expires_at).ok()
    }
}

/// Header fields the decoder insists on.
#[derive(Deserialize)]
struct TokenHeader {
    alg: String,
}

/// Payload as it appears on the wire.
///
/// Tokens have carried the subject as `id` and as `sub` over time; both are
/// accepted and `id` wins when both are present.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClaims {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    network_id: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    role_type: Option<RoleType>,
    iat: Option<i64>,
    exp: Option<i64>,
}

impl TryFrom<RawClaims> for Claims {
    type Error = TokenError;

    fn try_from(raw: RawClaims) -> Result<Self, Self::Error> {
        let subject = raw
            .id
            .or(raw.sub)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TokenError::invalid_format("missing subject claim"))?;
        let network_id = raw
            .network_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TokenError::invalid_format("missing networkId claim"))?;
        let expires_at = raw
            .exp
            .ok_or_else(|| TokenError::invalid_format("missing exp claim"))?;
        let issued_at = raw
            .iat
            .ok_or_else(|| TokenError::invalid_format("missing iat claim"))?;

        Ok(Self {
            subject_id: MemberId::new(subject),
            network_id: NetworkId::new(network_id),
            role: raw.role.unwrap_or_default(),
            role_type: raw.role_type.unwrap_or_default(),
            issued_at,
            expires_at,
        })
    }
}

/// Decodes an access token into typed claims.
///
/// Deterministic and side-effect free. Every malformed input, including
/// wrong segment counts, invalid base64, invalid JSON and missing required
/// claims, yields [`TokenError::InvalidTokenFormat`].
pub fn decode(token: &str) -> Result<Claims, TokenError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::invalid_format("empty token"));
    }

    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::invalid_format(
            "expected three dot-separated segments",
        ));
    };

    let header: TokenHeader = decode_segment(header, "header")?;
    if header.alg.is_empty() {
        return Err(TokenError::invalid_format("header has empty alg"));
    }

    let raw: RawClaims = decode_segment(payload, "payload")?;
    Claims::try_from(raw)
}

fn decode_segment<T: serde::de::DeserializeOwned>(
    segment: &str,
    what: &str,
) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| TokenError::invalid_format(format!("{what} is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::invalid_format(format!("{what} is not valid JSON: {e}")))
}
