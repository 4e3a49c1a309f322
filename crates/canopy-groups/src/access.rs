//! Access levels for group and project membership.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access level granted by a membership.
///
/// Levels are ordered: Guest < Reporter < Developer < Master < Owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Can view and comment.
    Guest,
    /// Can read code and pull.
    Reporter,
    /// Can push to unprotected branches.
    Developer,
    /// Can manage settings, hooks and protected branches.
    Master,
    /// Full control of the group.
    Owner,
}

impl AccessLevel {
    /// All levels, lowest first.
    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::Guest,
        AccessLevel::Reporter,
        AccessLevel::Developer,
        AccessLevel::Master,
        AccessLevel::Owner,
    ];

    /// Check if this level grants at least the required level.
    pub fn has(&self, required: AccessLevel) -> bool {
        *self >= required
    }

    /// Numeric value used by the platform's APIs.
    pub fn value(&self) -> u8 {
        match self {
            AccessLevel::Guest => 10,
            AccessLevel::Reporter => 20,
            AccessLevel::Developer => 30,
            AccessLevel::Master => 40,
            AccessLevel::Owner => 50,
        }
    }

    /// Parse from a numeric API value.
    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.value() == value)
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "guest" => Some(AccessLevel::Guest),
            "reporter" => Some(AccessLevel::Reporter),
            "developer" => Some(AccessLevel::Developer),
            "master" | "maintainer" => Some(AccessLevel::Master),
            "owner" => Some(AccessLevel::Owner),
            _ => None,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::Guest => write!(f, "guest"),
            AccessLevel::Reporter => write!(f, "reporter"),
            AccessLevel::Developer => write!(f, "developer"),
            AccessLevel::Master => write!(f, "master"),
            AccessLevel::Owner => write!(f, "owner"),
        }
    }
}
