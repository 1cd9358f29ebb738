//! Session configuration.
//!
//! Cookie lifetimes, renewal cadence and logout redirects for the client.
//!
//! # Example (TOML)
//!
//! ```toml
//! [session.cookies]
//! access_ttl = "7d"
//! refresh_ttl = "365d"
//!
//! [session.refresh]
//! interval = "30s"
//! renewal_margin = "1m"
//! network_domain = "community.example.com"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root session configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie persistence of the token pair.
    pub cookies: CookieSettings,

    /// Background token renewal.
    pub refresh: RefreshSettings,

    /// Logout redirects.
    pub logout: LogoutSettings,
}

/// Cookie persistence settings.
///
/// The access and refresh lifetimes are independent of each other and of
/// the token's own `exp` claim. They only bound how long the browser keeps
/// the value; usability is decided by the claims.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieSettings {
    /// Name of the access token cookie.
    pub access_cookie_name: String,

    /// Name of the refresh token cookie.
    pub refresh_cookie_name: String,

    /// Max-Age of the access token cookie.
    #[serde(with = "humantime_serde")]
    pub access_ttl: Duration,

    /// Max-Age of the refresh token cookie.
    #[serde(with = "humantime_serde")]
    pub refresh_ttl: Duration,

    /// Cookie path.
    pub path: String,

    /// Cookie domain. Host-only when unset.
    pub domain: Option<String>,

    /// Emit the `Secure` attribute.
    pub secure: bool,

    /// SameSite policy: "strict", "lax" or "none".
    pub same_site: String,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            access_cookie_name: "accessToken".to_string(),
            refresh_cookie_name: "refreshToken".to_string(),
            access_ttl: Duration::from_secs(7 * 24 * 3600), // 7 days
            refresh_ttl: Duration::from_secs(365 * 24 * 3600), // 365 days
            path: "/".to_string(),
            domain: None,
            secure: true,
            same_site: "lax".to_string(),
        }
    }
}

/// Background renewal settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Time between renewal checks.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Renew when the access token expires within this window.
    #[serde(with = "humantime_serde")]
    pub renewal_margin: Duration,

    /// Network domain sent with every refresh request.
    pub network_domain: String,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            renewal_margin: Duration::from_secs(60),
            network_domain: String::new(),
        }
    }
}

/// Logout redirect settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogoutSettings {
    /// Single sign-on logout URL. Takes precedence over `login_path`.
    pub sso_logout_url: Option<String>,

    /// Default path to send the user to after logout.
    pub login_path: String,
}

impl Default for LogoutSettings {
    fn default() -> Self {
        Self {
            sso_logout_url: None,
            login_path: "/auth/login".to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl SessionConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - A cookie name is empty or contains characters outside the token set
    /// - The two cookie names collide
    /// - A cookie TTL or the refresh interval is zero
    /// - The SameSite policy is unknown
    /// - The login path is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cookies = &self.cookies;
        for name in [&cookies.access_cookie_name, &cookies.refresh_cookie_name] {
            if !is_cookie_token(name) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid cookie name: '{name}'"
                )));
            }
        }
        if cookies.access_cookie_name == cookies.refresh_cookie_name {
            return Err(ConfigError::InvalidValue(
                "access and refresh cookie names must differ".to_string(),
            ));
        }
        if cookies.access_ttl.is_zero() || cookies.refresh_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "cookie TTLs must be > 0".to_string(),
            ));
        }
        match cookies.same_site.to_ascii_lowercase().as_str() {
            "strict" | "lax" | "none" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid same_site: '{other}'. Must be strict, lax, or none"
                )));
            }
        }

        if self.refresh.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "refresh.interval must be > 0".to_string(),
            ));
        }

        if self.logout.login_path.trim().is_empty() {
            return Err(ConfigError::Missing("logout.login_path".to_string()));
        }

        Ok(())
    }
}

/// RFC 6265 cookie-name token: visible ASCII minus separators.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}
