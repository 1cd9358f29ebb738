//! Tracing setup for the client and CLI.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! The level comes from `RUST_LOG` when set, otherwise from
//! `logging.level`, and can be changed later with [`apply_logging_level`].

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Installs the global subscriber. Later calls leave the first one in place.
pub fn init_tracing_with_level(level: &str) {
    let filter = match std::env::var_os("RUST_LOG") {
        Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        None => EnvFilter::new(level),
    };
    let (filter, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .is_ok();
    if installed {
        let _ = LOG_RELOAD_HANDLE.set(handle);
    }
}

/// Swaps the active level. Returns `false` if tracing was not initialized
/// by [`init_tracing_with_level`].
pub fn apply_logging_level(level: &str) -> bool {
    LOG_RELOAD_HANDLE
        .get()
        .is_some_and(|handle| handle.reload(EnvFilter::new(level)).is_ok())
}
