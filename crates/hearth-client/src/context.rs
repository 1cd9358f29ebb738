//! Client runtime registry.
//!
//! [`ClientContext`] owns every long-lived piece of client state: the token
//! store, the cookie adapter, the normalized cache with its consistency
//! engine, and the refresh scheduler. Build one per process (or per test).

use std::sync::Arc;

use axum::http::HeaderMap;
use hearth_auth::{
    LogoutClient, LogoutOutcome, RefreshClient, RefreshScheduler, SessionCookies, TokenPair,
    TokenStore, logout, logout_with_cookies,
};
use hearth_cache::{
    CacheConsistencyEngine, MutationDescriptor, MutationError, MutationOutcome, MutationTransport,
    NormalizedCache, NoticeBus,
};
use hearth_core::{Clock, SystemClock};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::ClientError;
use crate::transport::GraphqlTransport;

/// Where the initial session comes from.
#[derive(Debug)]
pub enum SessionSeed {
    /// Request headers carrying the session cookies.
    Cookies(HeaderMap),
    /// A pair stored by an earlier run.
    Pair(TokenPair),
    /// Start signed out.
    Empty,
}

pub struct ClientContext {
    config: AppConfig,
    store: Arc<TokenStore>,
    cookies: SessionCookies,
    cache: Arc<NormalizedCache>,
    engine: Arc<CacheConsistencyEngine>,
    scheduler: RefreshScheduler,
    logout_client: Arc<dyn LogoutClient>,
}

impl ClientContext {
    /// Builds a context talking to the configured GraphQL endpoint.
    pub fn connect(config: AppConfig) -> Result<Self, ClientError> {
        config.validate().map_err(ClientError::Config)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(TokenStore::new(clock));
        let transport = Arc::new(GraphqlTransport::new(&config.api, store.clone())?);
        info!(endpoint = transport.endpoint(), "Client context ready");
        Ok(Self::with_transport(config, store, transport))
    }

    /// Builds a context around an existing store and transport.
    pub fn with_transport<T>(config: AppConfig, store: Arc<TokenStore>, transport: Arc<T>) -> Self
    where
        T: RefreshClient + LogoutClient + MutationTransport + 'static,
    {
        let cookies = SessionCookies::new(config.session.cookies.clone());
        let cache = Arc::new(NormalizedCache::new());
        let engine = Arc::new(CacheConsistencyEngine::with_notices(
            cache.clone(),
            transport.clone(),
            NoticeBus::default(),
        ));
        let scheduler =
            RefreshScheduler::new(store.clone(), transport.clone(), &config.session.refresh);
        Self {
            config,
            store,
            cookies,
            cache,
            engine,
            scheduler,
            logout_client: transport,
        }
    }

    /// Seeds the token store. Returns `true` if a pair was stored.
    pub fn init(&self, seed: SessionSeed) -> bool {
        let pair = match seed {
            SessionSeed::Cookies(headers) => self.cookies.read(&headers),
            SessionSeed::Pair(pair) => Some(pair),
            SessionSeed::Empty => None,
        };
        match pair {
            Some(pair) => {
                self.store.set(pair);
                debug!(usable = !self.store.is_expired(), "Session seeded");
                true
            }
            None => {
                self.store.clear();
                false
            }
        }
    }

    /// Starts background token renewal.
    pub fn start(&self) {
        self.scheduler.start(self.config.session.refresh.interval);
    }

    /// Stops background token renewal. A refresh already in flight still
    /// completes and updates the store.
    pub fn shutdown(&self) {
        self.scheduler.stop();
    }

    pub async fn apply(
        &self,
        mutation: &MutationDescriptor,
    ) -> Result<MutationOutcome, MutationError> {
        self.engine.apply(mutation).await
    }

    /// Stops renewal, then logs out. A refresh still in flight finishes
    /// but no longer writes the store.
    pub async fn logout(&self) -> LogoutOutcome {
        self.scheduler.stop();
        logout(
            &self.store,
            self.logout_client.as_ref(),
            &self.config.session.logout,
        )
        .await
    }

    /// Logs out and resets the session cookies on `response_headers`.
    pub async fn logout_response(&self, response_headers: &mut HeaderMap) -> LogoutOutcome {
        self.scheduler.stop();
        logout_with_cookies(
            &self.store,
            self.logout_client.as_ref(),
            &self.config.session.logout,
            &self.cookies,
            response_headers,
        )
        .await
    }

    /// Writes the current pair as session cookies. Returns `false` when
    /// signed out.
    pub fn persist_cookies(&self, response_headers: &mut HeaderMap) -> bool {
        match self.store.get() {
            Some(pair) => {
                self.cookies.write_default(response_headers, &pair);
                true
            }
            None => false,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub fn cache(&self) -> &Arc<NormalizedCache> {
        &self.cache
    }

    pub fn engine(&self) -> &Arc<CacheConsistencyEngine> {
        &self.engine
    }

    pub fn notices(&self) -> &NoticeBus {
        self.engine.notices()
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }
}

impl Drop for ClientContext {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}
