//! Cookie persistence of the session token pair.
//!
//! Server-rendered requests carry the token pair as two httpOnly cookies.
//! The access and refresh cookies have independent lifetimes, neither tied
//! to the access token's `exp` claim.

use std::time::Duration;

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, SET_COOKIE},
};
use cookie::{Cookie, SameSite};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::CookieSettings;
use crate::token::TokenPair;

/// Max-Age of each session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieTtl {
    pub access: Duration,
    pub refresh: Duration,
}

impl CookieTtl {
    pub fn new(access: Duration, refresh: Duration) -> Self {
        Self { access, refresh }
    }
}

/// Reads and writes the token pair cookies.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    settings: CookieSettings,
}

impl Default for SessionCookies {
    fn default() -> Self {
        Self::new(CookieSettings::default())
    }
}

impl SessionCookies {
    pub fn new(settings: CookieSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CookieSettings {
        &self.settings
    }

    /// Lifetimes configured in [`CookieSettings`].
    pub fn default_ttl(&self) -> CookieTtl {
        CookieTtl::new(self.settings.access_ttl, self.settings.refresh_ttl)
    }

    /// Extracts the token pair from the request `Cookie` headers.
    ///
    /// Returns `None` when neither cookie is present. A single missing
    /// cookie yields an empty string for that half of the pair.
    pub fn read(&self, headers: &HeaderMap) -> Option<TokenPair> {
        let mut access = None;
        let mut refresh = None;

        for value in headers.get_all(COOKIE) {
            let Ok(raw) = value.to_str() else {
                debug!("Skipping non-ASCII Cookie header");
                continue;
            };
            for parsed in Cookie::split_parse_encoded(raw) {
                let Ok(cookie) = parsed else {
                    continue;
                };
                if cookie.name() == self.settings.access_cookie_name {
                    access = Some(cookie.value().to_string());
                } else if cookie.name() == self.settings.refresh_cookie_name {
                    refresh = Some(cookie.value().to_string());
                }
            }
        }

        if access.is_none() && refresh.is_none() {
            return None;
        }
        Some(TokenPair::new(
            access.unwrap_or_default(),
            refresh.unwrap_or_default(),
        ))
    }

    /// Appends `Set-Cookie` headers persisting `pair`.
    pub fn write(&self, headers: &mut HeaderMap, pair: &TokenPair, ttl: CookieTtl) {
        let access = self.build(
            &self.settings.access_cookie_name,
            pair.access_token.clone(),
            max_age(ttl.access),
        );
        let refresh = self.build(
            &self.settings.refresh_cookie_name,
            pair.refresh_token.clone(),
            max_age(ttl.refresh),
        );
        append(headers, &access);
        append(headers, &refresh);
    }

    /// [`SessionCookies::write`] with the configured lifetimes.
    pub fn write_default(&self, headers: &mut HeaderMap, pair: &TokenPair) {
        self.write(headers, pair, self.default_ttl());
    }

    /// Appends `Set-Cookie` headers expiring both cookies.
    pub fn reset(&self, headers: &mut HeaderMap) {
        for name in [
            &self.settings.access_cookie_name,
            &self.settings.refresh_cookie_name,
        ] {
            let mut cookie = self.build(name, String::new(), time::Duration::ZERO);
            cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
            append(headers, &cookie);
        }
    }

    fn build(&self, name: &str, value: String, max_age: time::Duration) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value))
            .http_only(true)
            .secure(self.settings.secure)
            .same_site(same_site(&self.settings.same_site))
            .path(self.settings.path.clone())
            .max_age(max_age);
        if let Some(domain) = &self.settings.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }
}

fn same_site(policy: &str) -> SameSite {
    match policy.to_ascii_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    }
}

fn max_age(ttl: Duration) -> time::Duration {
    time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX)
}

fn append(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.encoded().to_string()) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(e) => {
            warn!(cookie = %cookie.name(), error = %e, "Failed to build Set-Cookie header");
        }
    }
}
