//! # hearth-auth
//!
//! Session token lifecycle for the Hearth community client.
//!
//! This crate provides:
//! - Access token decoding into typed claims
//! - A process-wide token store with atomic replacement
//! - Cookie persistence of the token pair for server-rendered requests
//! - Background single-flight token renewal
//! - Best-effort logout
//! - Advisory permission lookups for UI affordances
//!
//! ## Modules
//!
//! - [`config`] - Session, cookie, refresh and logout configuration
//! - [`token`] - Claims decoding and the token store
//! - [`cookie`] - Cookie persistence of the token pair
//! - [`refresh`] - Refresh endpoint contract and the renewal scheduler
//! - [`logout`] - Logout flow and redirect selection
//! - [`policy`] - Permission gate

pub mod config;
pub mod cookie;
pub mod error;
pub mod logout;
pub mod policy;
pub mod refresh;
pub mod token;

pub use config::{ConfigError, CookieSettings, LogoutSettings, RefreshSettings, SessionConfig};
pub use cookie::{CookieTtl, SessionCookies};
pub use error::AuthError;
pub use logout::{LogoutClient, LogoutOutcome, logout, logout_with_cookies};
pub use policy::{
    ActionPermission, ActionPermissionCheck, AuthorizationStatus, InputPermission,
    InputPermissionCheck, has_action_permission, has_input_permission,
};
pub use refresh::{
    MemberSnapshot, NetworkSnapshot, RefreshClient, RefreshRequest, RefreshScheduler,
    RefreshedSession, TickOutcome,
};
pub use token::{Claims, RoleType, TokenError, TokenPair, TokenStore, decode};

/// Type alias for session operation results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use hearth_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::SessionConfig;
    pub use crate::cookie::SessionCookies;
    pub use crate::error::AuthError;
    pub use crate::policy::{has_action_permission, has_input_permission};
    pub use crate::refresh::{RefreshClient, RefreshScheduler};
    pub use crate::token::{Claims, TokenPair, TokenStore};
}
