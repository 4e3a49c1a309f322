//! Protected branch and tag rules.

use canopy_types::ProjectId;
use serde::{Deserialize, Serialize};

/// Kind of ref a rule protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// Branch rule.
    Branch,
    /// Tag rule.
    Tag,
}

/// A protection rule for branches or tags of a project.
///
/// Protected refs gate protected CI variables: only jobs on a protected
/// ref receive them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedRef {
    /// Unique rule ID.
    pub id: u64,
    /// Project the rule applies to.
    pub project_id: ProjectId,
    /// Branch or tag.
    pub kind: RefKind,
    /// Ref name or pattern (e.g. "main", "release/*", "v*").
    pub name: String,
    /// When the rule was created (Unix timestamp).
    pub created_at: u64,
}

impl ProtectedRef {
    /// Create a new rule.
    pub fn new(id: u64, project_id: ProjectId, kind: RefKind, name: String) -> Self {
        Self {
            id,
            project_id,
            kind,
            name,
            created_at: canopy_types::unix_now(),
        }
    }

    /// Whether the rule name contains a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.name.contains('*')
    }

    /// Check if this rule matches a ref name.
    ///
    /// `*` matches any run of characters, including `/`.
    pub fn matches(&self, ref_name: &str) -> bool {
        if !self.is_wildcard() {
            return ref_name == self.name;
        }

        let parts: Vec<&str> = self.name.split('*').collect();
        let (first, rest) = match parts.split_first() {
            Some(split) => split,
            None => return false,
        };
        let Some(mut remaining) = ref_name.strip_prefix(first) else {
            return false;
        };

        let last = rest.len().saturating_sub(1);
        for (i, part) in rest.iter().enumerate() {
            if i == last {
                return remaining.ends_with(part);
            }
            match remaining.find(part) {
                Some(pos) => remaining = &remaining[pos + part.len()..],
                None => return false,
            }
        }
        true
    }
}
