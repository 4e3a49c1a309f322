//! Common types used throughout `canopy`.
//!
//! This crate provides the identifiers and small value types shared by the
//! group membership engine and the operator CLI.

mod identity;
mod visibility;

pub use identity::User;
pub use visibility::Visibility;

/// Identifier of a group.
pub type GroupId = u64;

/// Identifier of a user.
pub type UserId = u64;

/// Identifier of a project.
pub type ProjectId = u64;

/// Default two-factor grace period in hours, applied when no group sets one.
pub const DEFAULT_TWO_FACTOR_GRACE_PERIOD: i64 = 48;

/// Returns the current time as a Unix timestamp in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
