//! # hearth-client
//!
//! Runtime wiring for the Hearth community client.
//!
//! ## Modules
//!
//! - [`config`] - Application configuration and its loader
//! - [`observability`] - Tracing setup with a reloadable level
//! - [`transport`] - GraphQL transport for refresh, logout and mutations
//! - [`context`] - The registry owning all client state

pub mod config;
pub mod context;
pub mod error;
pub mod observability;
pub mod transport;

pub use config::{ApiConfig, AppConfig, LoggingConfig};
pub use context::{ClientContext, SessionSeed};
pub use error::ClientError;
pub use transport::GraphqlTransport;
