//! User identity and the two-factor requirement derived from group policy.

use crate::{UserId, DEFAULT_TWO_FACTOR_GRACE_PERIOD};
use serde::{Deserialize, Serialize};

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Unique username.
    pub username: String,
    /// Optional display name.
    pub name: Option<String>,
    /// Whether some group the user belongs to enforces two-factor authentication.
    pub require_two_factor_authentication_from_group: bool,
    /// Hours the user has to set up two-factor authentication.
    pub two_factor_grace_period: i64,
    /// When the user was created (Unix timestamp).
    pub created_at: u64,
}

impl User {
    /// Creates a new user with no group-derived two-factor requirement.
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            name: None,
            require_two_factor_authentication_from_group: false,
            two_factor_grace_period: DEFAULT_TWO_FACTOR_GRACE_PERIOD,
            created_at: crate::unix_now(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Applies a recomputed two-factor requirement.
    ///
    /// `periods` holds the grace periods of every enforcing group in the
    /// user's hierarchy. The result depends only on the arguments, so
    /// applying the same inputs twice leaves the user unchanged.
    pub fn apply_two_factor_requirement(&mut self, periods: &[i64], default_period: i64) {
        self.require_two_factor_authentication_from_group = !periods.is_empty();
        self.two_factor_grace_period = periods.iter().copied().min().unwrap_or(default_period);
    }
}
