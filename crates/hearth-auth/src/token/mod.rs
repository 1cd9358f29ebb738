//! Access token decoding and storage.
//!
//! - [`claims`] - Decoding an access token into [`Claims`]
//! - [`store`] - The process-wide [`TokenStore`]

pub mod claims;
pub mod store;

pub use claims::{Claims, EXPIRY_SKEW_SECS, RoleType, TokenError, decode};
pub use store::{TokenPair, TokenStore};
