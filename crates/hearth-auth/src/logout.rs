//! Logout flow.
//!
//! Logout is lenient: the server call is best effort, and local teardown and
//! the redirect happen whether or not the server acknowledged it.

use async_trait::async_trait;
use axum::http::HeaderMap;
use tracing::{debug, info, warn};

use crate::AuthResult;
use crate::config::LogoutSettings;
use crate::cookie::SessionCookies;
use crate::token::TokenStore;

/// The server's logout endpoint.
#[async_trait]
pub trait LogoutClient: Send + Sync {
    /// Invalidates the session identified by `access_token`.
    async fn logout(&self, access_token: &str) -> AuthResult<()>;
}

/// Where to send the user after logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    /// SSO logout URL if configured, otherwise the login path.
    pub redirect: String,
    /// Whether the server confirmed the logout.
    pub server_acknowledged: bool,
}

/// Logs out the current session.
///
/// Presents the stored access token to the server when one decodes, even if
/// expired. Failures are logged and swallowed. The store is always cleared.
pub async fn logout(
    store: &TokenStore,
    client: &dyn LogoutClient,
    settings: &LogoutSettings,
) -> LogoutOutcome {
    let server_acknowledged = match store.access_token() {
        Some(token) => match client.logout(&token).await {
            Ok(()) => {
                info!("Server session logged out");
                true
            }
            Err(e) => {
                warn!(error = %e, "Logout call failed, clearing local session anyway");
                false
            }
        },
        None => {
            debug!("No access token stored, skipping server logout");
            false
        }
    };

    store.clear();

    LogoutOutcome {
        redirect: redirect_target(settings),
        server_acknowledged,
    }
}

/// [`logout`] for server-rendered responses; also resets the session
/// cookies on `response_headers`.
pub async fn logout_with_cookies(
    store: &TokenStore,
    client: &dyn LogoutClient,
    settings: &LogoutSettings,
    cookies: &SessionCookies,
    response_headers: &mut HeaderMap,
) -> LogoutOutcome {
    let outcome = logout(store, client, settings).await;
    cookies.reset(response_headers);
    outcome
}

fn redirect_target(settings: &LogoutSettings) -> String {
    settings
        .sso_logout_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or(&settings.login_path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::token::TokenPair;
    use axum::http::header::SET_COOKIE;
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use hearth_core::ManualClock;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingClient {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl LogoutClient for RecordingClient {
        async fn logout(&self, access_token: &str) -> AuthResult<()> {
            self.seen.lock().push(access_token.to_string());
            if self.fail {
                Err(AuthError::network("connection reset"))
            } else {
                Ok(())
            }
        }
    }

    fn client(fail: bool) -> RecordingClient {
        RecordingClient {
            seen: Mutex::new(Vec::new()),
            fail,
        }
    }

    fn token(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"id":"m1","networkId":"n1","iat":0,"exp":{exp}}}"#
        ));
        format!("{header}.{payload}.sig")
    }

    fn store_with(access: String) -> TokenStore {
        TokenStore::with_pair(
            Arc::new(ManualClock::at_secs(5_000)),
            TokenPair::new(access, "r1"),
        )
    }

    #[tokio::test]
    async fn test_logout_presents_expired_token() {
        let access = token(100);
        let store = store_with(access.clone());
        let client = client(false);

        let outcome = logout(&store, &client, &LogoutSettings::default()).await;

        assert!(outcome.server_acknowledged);
        assert_eq!(outcome.redirect, "/auth/login");
        assert_eq!(client.seen.lock().as_slice(), &[access]);
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn test_failed_call_still_clears() {
        let store = store_with(token(10_000));
        let settings = LogoutSettings {
            sso_logout_url: Some("https://sso.example.com/logout".to_string()),
            ..LogoutSettings::default()
        };

        let outcome = logout(&store, &client(true), &settings).await;

        assert!(!outcome.server_acknowledged);
        assert_eq!(outcome.redirect, "https://sso.example.com/logout");
        assert!(!store.is_present());
    }

    #[tokio::test]
    async fn test_no_token_skips_server_call() {
        let store = store_with("garbage".to_string());
        let client = client(false);

        let outcome = logout(&store, &client, &LogoutSettings::default()).await;

        assert!(!outcome.server_acknowledged);
        assert!(client.seen.lock().is_empty());
        assert!(!store.is_present());
    }

    #[tokio::test]
    async fn test_blank_sso_url_falls_back_to_login() {
        let store = store_with(token(10_000));
        let settings = LogoutSettings {
            sso_logout_url: Some("  ".to_string()),
            login_path: "/signin".to_string(),
        };
        let outcome = logout(&store, &client(false), &settings).await;
        assert_eq!(outcome.redirect, "/signin");
    }

    #[tokio::test]
    async fn test_logout_with_cookies_resets_both() {
        let store = store_with(token(10_000));
        let mut headers = HeaderMap::new();

        logout_with_cookies(
            &store,
            &client(true),
            &LogoutSettings::default(),
            &SessionCookies::default(),
            &mut headers,
        )
        .await;

        let set: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|c| c.contains("Max-Age=0")));
    }
}
