//! Silent token renewal.
//!
//! [`RefreshScheduler`] wakes on a fixed interval and renews the access token
//! when it is missing, expired, or about to expire. At most one refresh call
//! is in flight at a time: concurrent callers join the pending call and all
//! observe the same result.
//!
//! The refresh itself runs on its own task, so stopping the scheduler (or
//! dropping a caller's future) never cancels a renewal that already started.
//! A renewal that lands after the store was cleared or replaced is dropped,
//! so logging out while a refresh is pending stays logged out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use hearth_core::{MemberId, NetworkId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::AuthResult;
use crate::config::RefreshSettings;
use crate::error::AuthError;
use crate::token::{RoleType, TokenPair, TokenStore, decode};

// =============================================================================
// Refresh Endpoint Contract
// =============================================================================

/// Body of a refresh call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub network_domain: String,
}

/// Member profile returned alongside renewed tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSnapshot {
    pub id: MemberId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role_type: RoleType,
}

/// Network summary returned alongside renewed tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    pub id: NetworkId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Successful refresh response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedSession {
    #[serde(flatten)]
    pub tokens: TokenPair,
    #[serde(default)]
    pub member: Option<MemberSnapshot>,
    #[serde(default)]
    pub network: Option<NetworkSnapshot>,
}

/// The server's token refresh endpoint.
#[async_trait]
pub trait RefreshClient: Send + Sync {
    /// Exchanges a refresh token for a new token pair.
    async fn refresh(&self, request: RefreshRequest) -> AuthResult<RefreshedSession>;
}

// =============================================================================
// Scheduler
// =============================================================================

/// Result of a single scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The access token is valid beyond the renewal margin.
    Fresh,
    /// Renewal was due but no refresh token is stored.
    NoRefreshToken,
    /// The store now holds a renewed pair.
    Renewed,
    /// The refresh call failed; the stored pair is unchanged.
    Failed,
}

type SharedRefresh = Shared<BoxFuture<'static, AuthResult<Arc<RefreshedSession>>>>;

struct InFlight {
    generation: u64,
    result: SharedRefresh,
}

struct Ticker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    store: Arc<TokenStore>,
    client: Arc<dyn RefreshClient>,
    network_domain: String,
    renewal_margin: Duration,
    inflight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    ticker: Mutex<Option<Ticker>>,
}

/// Background renewal of the stored access token.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<TokenStore>,
        client: Arc<dyn RefreshClient>,
        settings: &RefreshSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                client,
                network_domain: settings.network_domain.clone(),
                renewal_margin: settings.renewal_margin,
                inflight: Mutex::new(None),
                generation: AtomicU64::new(0),
                ticker: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.inner.store
    }

    /// Starts ticking every `interval`. The first tick fires immediately.
    ///
    /// Calling `start` on a running scheduler does nothing.
    pub fn start(&self, interval: Duration) {
        let mut ticker = self.inner.ticker.lock();
        if ticker.is_some() {
            debug!("Refresh scheduler already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let scheduler = self.clone();
        let handle = tokio::spawn(async move { scheduler.run(interval, stop_rx).await });
        *ticker = Some(Ticker {
            stop: stop_tx,
            handle,
        });
        info!(interval_secs = interval.as_secs_f64(), "Refresh scheduler started");
    }

    /// Prevents further ticks. A refresh already in flight still completes
    /// and updates the store.
    pub fn stop(&self) {
        if let Some(ticker) = self.inner.ticker.lock().take() {
            let _ = ticker.stop.send(true);
            drop(ticker.handle);
            info!("Refresh scheduler stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .ticker
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Returns `true` while a refresh call is pending.
    pub fn is_refreshing(&self) -> bool {
        self.inner.inflight.lock().is_some()
    }

    /// Checks the stored token and renews it when due.
    pub async fn tick(&self) -> TickOutcome {
        let store = &self.inner.store;
        if !store.needs_renewal(self.inner.renewal_margin) {
            return TickOutcome::Fresh;
        }
        if store.refresh_token().is_none() {
            debug!("Access token needs renewal but no refresh token is stored");
            return TickOutcome::NoRefreshToken;
        }
        match self.refresh_now().await {
            Ok(_) => TickOutcome::Renewed,
            Err(_) => TickOutcome::Failed,
        }
    }

    /// Renews the token pair now, joining a refresh already in flight.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthorized` when no refresh token is stored, or
    /// the error of the shared refresh call.
    pub async fn refresh_now(&self) -> AuthResult<Arc<RefreshedSession>> {
        let pending = Inner::join_or_spawn(&self.inner)?;
        pending.await
    }

    #[instrument(name = "refresh_scheduler", skip_all, fields(interval_secs = interval.as_secs_f64()))]
    async fn run(self, interval: Duration, mut stop: watch::Receiver<bool>) {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                _ = timer.tick() => {
                    let outcome = self.tick().await;
                    debug!(?outcome, "Refresh tick");
                }
            }
        }

        info!("Refresh scheduler stopped");
    }
}

impl Inner {
    fn join_or_spawn(this: &Arc<Self>) -> AuthResult<SharedRefresh> {
        let mut slot = this.inflight.lock();
        if let Some(inflight) = slot.as_ref() {
            debug!(generation = inflight.generation, "Joining in-flight refresh");
            return Ok(inflight.result.clone());
        }

        // read before the token so a write in between fails the commit
        let observed = this.store.generation();
        let refresh_token = this
            .store
            .refresh_token()
            .ok_or_else(|| AuthError::unauthorized("no refresh token"))?;
        let generation = this.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let inner = Arc::clone(this);
        let handle = tokio::spawn(async move {
            let result = inner.perform(refresh_token, observed).await;
            inner.finish(generation);
            result
        });
        let result = async move {
            handle.await.unwrap_or_else(|e| {
                Err(AuthError::internal(format!("refresh task failed: {e}")))
            })
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            generation,
            result: result.clone(),
        });
        Ok(result)
    }

    /// Calls the refresh endpoint and commits the renewed pair unless the
    /// store was written after `observed` (logout, re-login).
    async fn perform(
        &self,
        refresh_token: String,
        observed: u64,
    ) -> AuthResult<Arc<RefreshedSession>> {
        let request = RefreshRequest {
            refresh_token,
            network_domain: self.network_domain.clone(),
        };

        let session = match self.client.refresh(request).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, category = %e.category(), "Token refresh failed");
                return Err(e);
            }
        };

        if let Err(e) = decode(&session.tokens.access_token) {
            warn!(error = %e, "Refresh returned an undecodable access token");
            return Err(AuthError::refresh_failed(e.to_string()));
        }

        if self.store.set_if_current(observed, session.tokens.clone()) {
            info!(
                member_id = session.member.as_ref().map(|m| m.id.as_str()),
                "Session token renewed"
            );
        } else {
            debug!("Session changed while refreshing, renewed pair discarded");
        }
        Ok(Arc::new(session))
    }

    fn finish(&self, generation: u64) {
        let mut slot = self.inflight.lock();
        if slot.as_ref().is_some_and(|f| f.generation == generation) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use hearth_core::ManualClock;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn token(subject: &str, exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&json!({
                "id": subject, "networkId": "n1", "iat": exp - 3600, "exp": exp
            }))
            .unwrap(),
        );
        format!("{header}.{payload}.sig")
    }

    struct StubClient {
        calls: AtomicUsize,
        gate: Option<Notify>,
        response: parking_lot::Mutex<AuthResult<RefreshedSession>>,
        last_request: parking_lot::Mutex<Option<RefreshRequest>>,
    }

    impl StubClient {
        fn new(response: AuthResult<RefreshedSession>, gated: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: gated.then(Notify::new),
                response: parking_lot::Mutex::new(response),
                last_request: parking_lot::Mutex::new(None),
            })
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RefreshClient for StubClient {
        async fn refresh(&self, request: RefreshRequest) -> AuthResult<RefreshedSession> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock() = Some(request);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.response.lock().clone()
        }
    }

    fn renewed(access: String) -> AuthResult<RefreshedSession> {
        Ok(RefreshedSession {
            tokens: TokenPair::new(access, "r2"),
            member: None,
            network: None,
        })
    }

    fn settings() -> RefreshSettings {
        RefreshSettings {
            interval: Duration::from_secs(30),
            renewal_margin: Duration::from_secs(60),
            network_domain: "c.example.com".to_string(),
        }
    }

    fn store_at(clock: &ManualClock, exp: i64) -> Arc<TokenStore> {
        Arc::new(TokenStore::with_pair(
            Arc::new(clock.clone()),
            TokenPair::new(token("m1", exp), "r1"),
        ))
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_fresh_token_is_not_renewed() {
        let clock = ManualClock::at_secs(0);
        let client = StubClient::new(renewed(token("m1", 10_000)), false);
        let scheduler = RefreshScheduler::new(store_at(&clock, 1_000), client.clone(), &settings());

        assert_eq!(scheduler.tick().await, TickOutcome::Fresh);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_tick_within_margin_renews() {
        let clock = ManualClock::at_secs(950);
        let store = store_at(&clock, 1_000);
        let client = StubClient::new(renewed(token("m1", 10_000)), false);
        let scheduler = RefreshScheduler::new(store.clone(), client.clone(), &settings());

        assert_eq!(scheduler.tick().await, TickOutcome::Renewed);
        assert_eq!(client.calls(), 1);
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
        assert_eq!(store.claims().unwrap().expires_at, 10_000);

        let request = client.last_request.lock().clone().unwrap();
        assert_eq!(request.refresh_token, "r1");
        assert_eq!(request.network_domain, "c.example.com");
    }

    #[tokio::test]
    async fn test_concurrent_ticks_share_one_call() {
        let clock = ManualClock::at_secs(2_000);
        let store = store_at(&clock, 1_000);
        let client = StubClient::new(renewed(token("m1", 10_000)), true);
        let scheduler = RefreshScheduler::new(store.clone(), client.clone(), &settings());

        let (first, second, ()) = tokio::join!(scheduler.tick(), scheduler.tick(), async {
            tokio::task::yield_now().await;
            client.release();
        });

        assert_eq!(first, TickOutcome::Renewed);
        assert_eq!(second, TickOutcome::Renewed);
        assert_eq!(client.calls(), 1);
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));

        // the renewed token is fresh, so the next tick has nothing to do
        assert_eq!(scheduler.tick().await, TickOutcome::Fresh);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_result() {
        let clock = ManualClock::at_secs(2_000);
        let store = store_at(&clock, 1_000);
        let client = StubClient::new(renewed(token("m1", 10_000)), true);
        let scheduler = RefreshScheduler::new(store.clone(), client.clone(), &settings());

        let (first, second, ()) = tokio::join!(
            scheduler.refresh_now(),
            scheduler.refresh_now(),
            async {
                tokio::task::yield_now().await;
                client.release();
            }
        );

        assert_eq!(client.calls(), 1);
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!scheduler.is_refreshing());
    }

    struct AcceptLogout;

    #[async_trait]
    impl crate::logout::LogoutClient for AcceptLogout {
        async fn logout(&self, _access_token: &str) -> AuthResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_logout_during_refresh_stays_logged_out() {
        let clock = ManualClock::at_secs(2_000);
        let store = store_at(&clock, 1_000);
        let client = StubClient::new(renewed(token("m1", 10_000)), true);
        let scheduler = RefreshScheduler::new(store.clone(), client.clone(), &settings());

        let pending = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.refresh_now().await }
        });
        wait_until(|| client.calls() == 1).await;

        scheduler.stop();
        let outcome = crate::logout::logout(&store, &AcceptLogout, &Default::default()).await;
        assert!(outcome.server_acknowledged);
        assert!(!store.is_present());

        client.release();
        let session = pending.await.unwrap().unwrap();

        // the caller still sees the server's answer, the store does not
        assert_eq!(session.tokens.refresh_token, "r2");
        assert!(!store.is_present());
        assert!(store.refresh_token().is_none());
    }

    #[tokio::test]
    async fn test_newer_pair_survives_pending_refresh() {
        let clock = ManualClock::at_secs(2_000);
        let store = store_at(&clock, 1_000);
        let client = StubClient::new(renewed(token("m1", 10_000)), true);
        let scheduler = RefreshScheduler::new(store.clone(), client.clone(), &settings());

        let pending = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.refresh_now().await }
        });
        wait_until(|| client.calls() == 1).await;

        // signed in again while the renewal is pending
        let relogin = TokenPair::new(token("m2", 20_000), "r9");
        store.set(relogin.clone());

        client.release();
        pending.await.unwrap().unwrap();

        assert_eq!(store.get(), Some(relogin));
        assert_eq!(store.claims().unwrap().subject_id.as_str(), "m2");
    }

    #[tokio::test]
    async fn test_failure_leaves_pair_untouched() {
        let clock = ManualClock::at_secs(2_000);
        let store = store_at(&clock, 1_000);
        let before = store.get();
        let client = StubClient::new(Err(AuthError::server(500, "boom")), false);
        let scheduler = RefreshScheduler::new(store.clone(), client.clone(), &settings());

        assert_eq!(scheduler.tick().await, TickOutcome::Failed);
        assert_eq!(store.get(), before);

        // no hidden retry; the next tick issues exactly one more call
        assert_eq!(client.calls(), 1);
        assert_eq!(scheduler.tick().await, TickOutcome::Failed);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_renewal_is_rejected() {
        let clock = ManualClock::at_secs(2_000);
        let store = store_at(&clock, 1_000);
        let before = store.get();
        let client = StubClient::new(renewed("not-a-token".to_string()), false);
        let scheduler = RefreshScheduler::new(store.clone(), client, &settings());

        let err = scheduler.refresh_now().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed { .. }));
        assert_eq!(store.get(), before);
    }

    #[tokio::test]
    async fn test_missing_refresh_token() {
        let clock = ManualClock::at_secs(0);
        let store = Arc::new(TokenStore::new(Arc::new(clock)));
        let client = StubClient::new(renewed(token("m1", 10_000)), false);
        let scheduler = RefreshScheduler::new(store, client.clone(), &settings());

        assert_eq!(scheduler.tick().await, TickOutcome::NoRefreshToken);
        assert!(matches!(
            scheduler.refresh_now().await,
            Err(AuthError::Unauthorized { .. })
        ));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_stop_does_not_abort_inflight_refresh() {
        let clock = ManualClock::at_secs(2_000);
        let store = store_at(&clock, 1_000);
        let client = StubClient::new(renewed(token("m1", 10_000)), true);
        let scheduler = RefreshScheduler::new(store.clone(), client.clone(), &settings());

        scheduler.start(Duration::from_secs(30));
        wait_until(|| client.calls() == 1).await;

        scheduler.stop();
        client.release();

        wait_until(|| store.refresh_token().as_deref() == Some("r2")).await;
        wait_until(|| !scheduler.is_running()).await;
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_drives_renewal() {
        let clock = ManualClock::at_secs(0);
        let store = store_at(&clock, 1_000);
        let client = StubClient::new(renewed(token("m1", 10_000)), false);
        let scheduler = RefreshScheduler::new(store.clone(), client.clone(), &settings());

        scheduler.start(Duration::from_secs(30));
        scheduler.start(Duration::from_secs(30));
        tokio::task::yield_now().await;
        assert_eq!(client.calls(), 0);

        clock.set(950_000);
        tokio::time::advance(Duration::from_secs(30)).await;
        wait_until(|| client.calls() == 1).await;
        wait_until(|| store.refresh_token().as_deref() == Some("r2")).await;

        scheduler.stop();
    }
}
