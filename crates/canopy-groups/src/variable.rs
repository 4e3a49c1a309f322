//! CI secret variables owned by groups.

use canopy_types::GroupId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A secret variable exposed to CI jobs of projects in the owning group
/// and its subgroups.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVariable {
    /// Unique variable ID.
    pub id: u64,
    /// Owning group.
    pub group_id: GroupId,
    /// Variable name (unique within the group).
    pub key: String,
    /// Secret value.
    pub value: String,
    /// Only exposed to jobs running on protected refs.
    pub protected: bool,
}

impl SecretVariable {
    /// Whether the variable is visible to a job on a ref with the given protection.
    pub fn visible_on(&self, ref_protected: bool) -> bool {
        ref_protected || !self.protected
    }
}

impl fmt::Debug for SecretVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretVariable")
            .field("id", &self.id)
            .field("group_id", &self.group_id)
            .field("key", &self.key)
            .field("value", &"[redacted]")
            .field("protected", &self.protected)
            .finish()
    }
}
