//! Strongly-typed identifiers used across the client.
//!
//! Identifiers are opaque strings (the remote service and the seeded dataset
//! both use readable ids such as `card-1`), validated on parse and on
//! deserialization.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CardError;

/// Upper bound on identifier length.
pub const MAX_ID_LEN: usize = 128;

/// Identifier of a card record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardId(String);

/// Identifier of an authenticated identity (card owner, favorite holder).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityId(String);

fn validate(name: &str, raw: &str) -> Result<(), CardError> {
    if raw.is_empty() {
        return Err(CardError::validation(format!("{name}: must not be empty")));
    }
    if raw.len() > MAX_ID_LEN {
        return Err(CardError::validation(format!(
            "{name}: longer than {MAX_ID_LEN} characters"
        )));
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control() || c == '/') {
        return Err(CardError::validation(format!(
            "{name}: contains whitespace, control characters or '/'"
        )));
    }
    Ok(())
}

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal, $prefix:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer parsing fixed ids in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::now_v7().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = CardError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                validate($name, s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<String> for $t {
            type Error = CardError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate($name, &value)?;
                Ok(Self(value))
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_newtype!(CardId, "CardId", "card");
impl_string_newtype!(IdentityId, "IdentityId", "user");
