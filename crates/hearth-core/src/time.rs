use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use time::OffsetDateTime;

use crate::error::{CoreError, Result};

/// Milliseconds since the Unix epoch.
pub type UnixMillis = i64;

/// Source of wall-clock time.
///
/// Expiry checks take a clock instead of reading system time directly so
/// that boundary behaviour can be pinned in tests.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> UnixMillis;
}

/// Wall clock backed by `OffsetDateTime::now_utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> UnixMillis {
        now_millis()
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(millis: UnixMillis) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    /// Clock positioned at a whole number of seconds.
    pub fn at_secs(secs: i64) -> Self {
        Self::new(secs * 1000)
    }

    pub fn set(&self, millis: UnixMillis) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> UnixMillis {
        self.millis.load(Ordering::SeqCst)
    }
}

pub fn now_millis() -> UnixMillis {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as UnixMillis
}

pub fn from_unix_secs(secs: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs).map_err(|e| {
        CoreError::invalid_timestamp(format!("Invalid Unix timestamp {secs}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_secs(100);
        assert_eq!(clock.now_millis(), 100_000);

        clock.advance(250);
        assert_eq!(clock.now_millis(), 100_250);

        clock.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let other = clock.clone();
        other.advance(42);
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_from_unix_secs() {
        let dt = from_unix_secs(1_700_000_000).unwrap();
        assert_eq!(dt.unix_timestamp(), 1_700_000_000);
        assert!(from_unix_secs(i64::MAX).is_err());
    }
}
