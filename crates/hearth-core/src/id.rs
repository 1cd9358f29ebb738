//! Typed identifiers.
//!
//! Server identifiers are opaque strings. Wrapping them keeps a member id from
//! being passed where a post id is expected when building cache keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parse an identifier, rejecting empty or whitespace-only input.
            pub fn parse(id: &str) -> Result<Self> {
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err(CoreError::invalid_id(format!(
                        "{} must not be empty",
                        stringify!($name)
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a network (a community instance).
    NetworkId
);
string_id!(
    /// Identifier of a member of a network.
    MemberId
);
string_id!(NotificationId);
string_id!(SpaceId);
string_id!(PostId);
string_id!(RoleId);
