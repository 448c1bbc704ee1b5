use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of roles an identity can hold.
///
/// Roles are only ever consumed through the named predicates in
/// [`crate::policy`]; call sites never compare role strings.
///
/// Legacy role names are accepted on input (`user`, `business`, `admin`) and
/// always written back in canonical form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    #[serde(alias = "user")]
    Member,
    #[serde(alias = "business")]
    Publisher,
    #[serde(alias = "admin")]
    Administrator,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Guest, Role::Member, Role::Publisher, Role::Administrator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Member => "member",
            Role::Publisher => "publisher",
            Role::Administrator => "administrator",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "member" | "user" => Ok(Role::Member),
            "publisher" | "business" => Ok(Role::Publisher),
            "administrator" | "admin" => Ok(Role::Administrator),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
