//! Propagation of group two-factor policy to members.
//!
//! Changing a group's two-factor settings does not touch users directly.
//! [`GroupStore::update_group`](crate::GroupStore::update_group) returns the
//! affected user IDs and the caller hands them to [`propagate_two_factor`].

use crate::error::{GroupError, Result};
use canopy_types::UserId;
use std::collections::HashSet;

/// Something that can recompute a user's group-derived two-factor requirement.
///
/// Implementations must be idempotent: recomputing twice from the same
/// state leaves the user unchanged.
pub trait TwoFactorRecompute {
    /// Recompute the requirement for one user.
    fn update_two_factor_requirement(&self, user: UserId) -> Result<()>;
}

/// Outcome of a propagation run.
#[derive(Debug, Default)]
pub struct CascadeReport {
    /// Users recomputed successfully.
    pub updated: Vec<UserId>,
    /// Users whose recomputation failed, with the error.
    pub failed: Vec<(UserId, GroupError)>,
}

impl CascadeReport {
    /// Whether every user was recomputed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Users to retry.
    pub fn failed_users(&self) -> Vec<UserId> {
        self.failed.iter().map(|(user, _)| *user).collect()
    }

    /// Retry the failed users, folding successes into this report.
    pub fn retry<T: TwoFactorRecompute + ?Sized>(&mut self, target: &T) {
        let pending = self.failed_users();
        let next = propagate_two_factor(&pending, target);
        self.updated.extend(next.updated);
        self.failed = next.failed;
    }
}

/// Recompute each user once. A failure for one user does not stop the others.
pub fn propagate_two_factor<T: TwoFactorRecompute + ?Sized>(
    users: &[UserId],
    target: &T,
) -> CascadeReport {
    let mut seen = HashSet::new();
    let mut report = CascadeReport::default();

    for &user in users {
        if !seen.insert(user) {
            continue;
        }
        match target.update_two_factor_requirement(user) {
            Ok(()) => report.updated.push(user),
            Err(e) => {
                tracing::warn!(user = user, error = %e, "two-factor recomputation failed");
                report.failed.push((user, e));
            }
        }
    }

    tracing::debug!(
        updated = report.updated.len(),
        failed = report.failed.len(),
        "two-factor propagation finished"
    );
    report
}
