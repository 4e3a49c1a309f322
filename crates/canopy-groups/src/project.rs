//! Projects and their direct members.

use crate::access::AccessLevel;
use canopy_types::{GroupId, ProjectId, UserId};
use serde::{Deserialize, Serialize};

/// A project living in a group (or in a personal namespace when `group_id` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID.
    pub id: ProjectId,
    /// Display name.
    pub name: String,
    /// URL segment.
    pub path: String,
    /// Owning group.
    pub group_id: Option<GroupId>,
    /// Whether the repository has no commits yet.
    pub empty_repo: bool,
    /// When the project was created (Unix timestamp).
    pub created_at: u64,
    /// When the project was last updated (Unix timestamp).
    pub updated_at: u64,
}

impl Project {
    /// Create a new, empty project.
    pub fn new(id: ProjectId, name: String, path: String, group_id: Option<GroupId>) -> Self {
        let now = canopy_types::unix_now();
        Self {
            id,
            name,
            path,
            group_id,
            empty_repo: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to create a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    /// Display name.
    pub name: String,
    /// URL segment.
    pub path: String,
    /// Owning group.
    #[serde(default)]
    pub group_id: Option<GroupId>,
}

impl NewProject {
    /// Project in a personal namespace.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            group_id: None,
        }
    }

    /// Place the project in a group.
    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }
}

/// A user granted access directly on a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    /// Project.
    pub project_id: ProjectId,
    /// Member.
    pub user_id: UserId,
    /// Granted level.
    pub access_level: AccessLevel,
    /// When the access was granted (Unix timestamp).
    pub created_at: u64,
}

impl ProjectMember {
    /// Create a new direct project member.
    pub fn new(project_id: ProjectId, user_id: UserId, access_level: AccessLevel) -> Self {
        Self {
            project_id,
            user_id,
            access_level,
            created_at: canopy_types::unix_now(),
        }
    }
}
