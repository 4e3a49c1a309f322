//! Group memberships and access requests.

use crate::access::AccessLevel;
use canopy_types::{GroupId, UserId};
use serde::{Deserialize, Serialize};

/// Whether a membership grants access yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipState {
    /// Grants its access level.
    Active,
    /// A pending request to join; grants nothing.
    RequestingAccess,
}

/// A user's membership in a group.
///
/// There is at most one membership per (group, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Unique membership ID.
    pub id: u64,
    /// Group the membership belongs to.
    pub group_id: GroupId,
    /// Member.
    pub user_id: UserId,
    /// Level granted once active.
    pub access_level: AccessLevel,
    /// Active or pending.
    pub state: MembershipState,
    /// When access was requested, for pending memberships.
    pub requested_at: Option<u64>,
    /// When the membership was created (Unix timestamp).
    pub created_at: u64,
    /// When the membership was last updated (Unix timestamp).
    pub updated_at: u64,
}

impl Membership {
    /// Create an active membership.
    pub fn active(id: u64, group_id: GroupId, user_id: UserId, access_level: AccessLevel) -> Self {
        let now = canopy_types::unix_now();
        Self {
            id,
            group_id,
            user_id,
            access_level,
            state: MembershipState::Active,
            requested_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a pending access request. Requesters are recorded at
    /// Developer, the level granted if accepted without a choice.
    pub fn request(id: u64, group_id: GroupId, user_id: UserId) -> Self {
        let now = canopy_types::unix_now();
        Self {
            id,
            group_id,
            user_id,
            access_level: AccessLevel::Developer,
            state: MembershipState::RequestingAccess,
            requested_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the membership grants access.
    pub fn is_active(&self) -> bool {
        self.state == MembershipState::Active
    }

    /// Whether this is a pending request.
    pub fn is_request(&self) -> bool {
        self.state == MembershipState::RequestingAccess
    }

    /// The granted level, or `None` while pending.
    pub fn granted_level(&self) -> Option<AccessLevel> {
        self.is_active().then_some(self.access_level)
    }

    /// Set the level and make the membership active, accepting any pending request.
    pub fn grant(&mut self, access_level: AccessLevel) {
        self.access_level = access_level;
        self.state = MembershipState::Active;
        self.requested_at = None;
        self.updated_at = canopy_types::unix_now();
    }
}
