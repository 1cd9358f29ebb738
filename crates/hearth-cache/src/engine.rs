//! Optimistic mutation protocol.
//!
//! [`CacheConsistencyEngine::apply`] runs one mutation through four steps:
//!
//! 1. Lock every touched key (sorted) and snapshot the touched entries.
//! 2. Write the optimistic prediction, visible to all readers.
//! 3. Dispatch the mutation.
//! 4. On `SUCCEEDED`, merge the server-confirmed fields. On a transport
//!    error or `FAILED`, restore the snapshot and publish a
//!    [`FailureNotice`].
//!
//! Entries re-fetched or evicted while the mutation is pending keep their
//! newer state: neither reconciliation nor rollback overwrites them.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::entry::CacheKey;
use crate::error::MutationError;
use crate::locks::KeyLocks;
use crate::mutation::{MutationDescriptor, MutationStatus, MutationTransport};
use crate::notice::{FailureNotice, NoticeBus};
use crate::reducer;
use crate::store::NormalizedCache;

/// Summary of a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub operation: &'static str,
    /// Keys locked and snapshotted for the mutation.
    pub touched: Vec<CacheKey>,
    /// Confirmed patches merged into the cache.
    pub merged: usize,
    /// Confirmed patches that matched no touched entry.
    pub unmatched: Vec<CacheKey>,
}

pub struct CacheConsistencyEngine {
    cache: Arc<NormalizedCache>,
    transport: Arc<dyn MutationTransport>,
    locks: KeyLocks,
    notices: NoticeBus,
}

impl CacheConsistencyEngine {
    pub fn new(cache: Arc<NormalizedCache>, transport: Arc<dyn MutationTransport>) -> Self {
        Self::with_notices(cache, transport, NoticeBus::default())
    }

    pub fn with_notices(
        cache: Arc<NormalizedCache>,
        transport: Arc<dyn MutationTransport>,
        notices: NoticeBus,
    ) -> Self {
        Self {
            cache,
            transport,
            locks: KeyLocks::new(),
            notices,
        }
    }

    pub fn cache(&self) -> &Arc<NormalizedCache> {
        &self.cache
    }

    pub fn notices(&self) -> &NoticeBus {
        &self.notices
    }

    /// Applies `mutation` optimistically and settles it against the server.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or `MutationError::Rejected` when the
    /// server reports `FAILED`. The touched entries are rolled back in both
    /// cases.
    #[instrument(skip_all, fields(operation = mutation.operation_name()))]
    pub async fn apply(
        &self,
        mutation: &MutationDescriptor,
    ) -> Result<MutationOutcome, MutationError> {
        let operation = mutation.operation_name();
        let keys = mutation.touched_keys(&self.cache);
        let _guard = self.locks.acquire(&keys).await;

        let (before, observed) = self.cache.capture(&keys);
        let predicted = reducer::optimistic(mutation, &before);
        let optimistic = self.cache.write_if_unchanged(&predicted, &observed);
        debug!(
            touched = keys.len(),
            written = optimistic.stamp.len(),
            "Optimistic update applied"
        );

        let result = match self.transport.dispatch(mutation).await {
            Ok(response) if response.status == MutationStatus::Succeeded => Ok(response),
            Ok(_) => Err(MutationError::rejected(operation)),
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                let reconciled = reducer::reconcile(&predicted, &response.confirmed);
                let report = self
                    .cache
                    .write_if_unchanged(&reconciled.state, &optimistic.stamp);
                self.cache.settle(&report.stamp);
                if !report.skipped.is_empty() {
                    debug!(
                        skipped = report.skipped.len(),
                        "Entries changed while the mutation was pending"
                    );
                }

                let merged = response.confirmed.len() - reconciled.unmatched.len();
                info!(touched = keys.len(), merged, "Mutation committed");
                Ok(MutationOutcome {
                    operation,
                    touched: keys,
                    merged,
                    unmatched: reconciled.unmatched,
                })
            }
            Err(error) => {
                let report = self.cache.write_if_unchanged(&before, &optimistic.stamp);
                let restored = report.stamp.keys();
                warn!(
                    error = %error,
                    category = %error.category(),
                    restored = restored.len(),
                    "Mutation failed, optimistic update rolled back"
                );
                self.notices
                    .publish(FailureNotice::from_error(operation, &error, restored));
                Err(error)
            }
        }
    }
}
