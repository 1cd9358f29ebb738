//! # hearth-cache
//!
//! Normalized client cache kept consistent with server-confirmed mutations.
//!
//! ## Modules
//!
//! - [`entry`] - Cached objects, keys and confirmed-field patches
//! - [`store`] - The normalized cache and query ownership
//! - [`mutation`] - Mutation descriptors and the transport contract
//! - [`reducer`] - Pure optimistic and reconcile reducers
//! - [`locks`] - Per-key mutation locks
//! - [`notice`] - Failure notices for rolled-back mutations
//! - [`engine`] - The optimistic mutation protocol

pub mod engine;
pub mod entry;
pub mod error;
pub mod locks;
pub mod mutation;
pub mod notice;
pub mod reducer;
pub mod store;

pub use engine::{CacheConsistencyEngine, MutationOutcome};
pub use entry::{
    CacheEntry, CacheKey, EntityType, EntryPatch, NetworkSettings, Notification,
    PostFollowState, Role, SpaceMember, SsoMembership, SsoStatus,
};
pub use error::MutationError;
pub use locks::KeyLocks;
pub use mutation::{MutationDescriptor, MutationResponse, MutationStatus, MutationTransport};
pub use notice::{FailureNotice, NoticeBus};
pub use reducer::{Reconciled, optimistic, reconcile};
pub use store::{NormalizedCache, QueryId, Snapshot};
