//! Group types for nested namespaces.

use crate::settings::Settings;
use crate::validation::{self, ValidationErrors};
use canopy_types::{GroupId, Visibility, DEFAULT_TWO_FACTOR_GRACE_PERIOD};
use serde::{Deserialize, Serialize};

/// A group: a namespace that owns projects, members, subgroups and CI variables.
///
/// Groups form a tree through `parent_id`. The parent is stored by ID only;
/// the store resolves the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique group ID.
    pub id: GroupId,
    /// Display name (unique among siblings).
    pub name: String,
    /// URL segment (unique among siblings).
    pub path: String,
    /// Parent group, if nested.
    pub parent_id: Option<GroupId>,
    /// Optional description.
    pub description: Option<String>,
    /// Who can see the group.
    pub visibility: Visibility,
    /// Whether users may request access.
    pub request_access_enabled: bool,
    /// Whether members must use two-factor authentication.
    pub require_two_factor_authentication: bool,
    /// Hours members have to enable two-factor authentication.
    pub two_factor_grace_period: i64,
    /// LFS override; `None` follows the instance setting.
    pub lfs_enabled: Option<bool>,
    /// Uploaded avatar file name.
    pub avatar: Option<String>,
    /// When the group was created (Unix timestamp).
    pub created_at: u64,
    /// When the group was last updated (Unix timestamp).
    pub updated_at: u64,
}

impl Group {
    /// Build an unsaved group from a creation request.
    pub(crate) fn from_new(id: GroupId, new: NewGroup) -> Self {
        let now = canopy_types::unix_now();
        Self {
            id,
            name: new.name,
            path: new.path,
            parent_id: new.parent_id,
            description: new.description,
            visibility: new.visibility,
            request_access_enabled: new.request_access_enabled,
            require_two_factor_authentication: new.require_two_factor_authentication,
            two_factor_grace_period: new.two_factor_grace_period,
            lfs_enabled: new.lfs_enabled,
            avatar: new.avatar,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the group has no parent.
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Reference used in Markdown, e.g. `@infra`.
    pub fn to_reference(&self) -> String {
        format!("@{}", self.name)
    }

    /// Name shown in listings.
    pub fn human_name(&self) -> &str {
        &self.name
    }

    /// Whether LFS is enabled, taking the instance setting into account.
    ///
    /// An instance-wide disable always wins over the group override.
    pub fn lfs_enabled(&self, settings: &Settings) -> bool {
        settings.lfs_enabled && self.lfs_enabled.unwrap_or(true)
    }

    /// Whether the avatar, if any, is an accepted image.
    pub fn avatar_type_valid(&self) -> bool {
        self.avatar
            .as_deref()
            .map(validation::is_image_file)
            .unwrap_or(true)
    }

    /// URL of the uploaded avatar.
    ///
    /// Relative by default; an asset host, or `only_path = false`, makes it absolute.
    pub fn avatar_url(&self, settings: &Settings, only_path: bool) -> Option<String> {
        let file = self.avatar.as_deref()?;
        let file_name = file.rsplit('/').next().unwrap_or(file);
        let path = format!("/uploads/-/system/group/avatar/{}/{}", self.id, file_name);

        if let Some(asset_host) = &settings.asset_host {
            return Some(format!("{}{}", asset_host.trim_end_matches('/'), path));
        }
        if only_path {
            Some(path)
        } else {
            Some(format!("{}{}", settings.base_url(), path))
        }
    }

    /// Checks that need only the group itself. Sibling uniqueness and
    /// parent existence are checked by the store.
    pub(crate) fn validate_attributes(&self, errors: &mut ValidationErrors) {
        if self.name.trim().is_empty() {
            errors.add("name", "blank", "can't be blank");
        } else if self.name.len() > validation::MAX_NAME_LENGTH {
            errors.add("name", "too_long", "is too long (maximum is 255 characters)");
        }

        if let Err(rejection) = validation::check_group_path(&self.path, self.is_top_level()) {
            errors.add("path", rejection.code(), rejection.to_string());
        }

        if self.two_factor_grace_period < 0 {
            errors.add(
                "two_factor_grace_period",
                "greater_than_or_equal_to",
                "must be greater than or equal to 0",
            );
        }

        if !self.avatar_type_valid() {
            errors.add("avatar", "content_type", "only images allowed");
        }
    }
}

/// Request to create a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
    /// Display name.
    pub name: String,
    /// URL segment.
    pub path: String,
    /// Parent group.
    #[serde(default)]
    pub parent_id: Option<GroupId>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Visibility (default: private).
    #[serde(default)]
    pub visibility: Visibility,
    /// Whether users may request access (default: true).
    #[serde(default = "default_true")]
    pub request_access_enabled: bool,
    /// Whether members must use two-factor authentication.
    #[serde(default)]
    pub require_two_factor_authentication: bool,
    /// Two-factor grace period in hours.
    #[serde(default = "default_grace_period")]
    pub two_factor_grace_period: i64,
    /// LFS override.
    #[serde(default)]
    pub lfs_enabled: Option<bool>,
    /// Avatar file name.
    #[serde(default)]
    pub avatar: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_grace_period() -> i64 {
    DEFAULT_TWO_FACTOR_GRACE_PERIOD
}

impl NewGroup {
    /// Start a request with a name and path.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            parent_id: None,
            description: None,
            visibility: Visibility::default(),
            request_access_enabled: true,
            require_two_factor_authentication: false,
            two_factor_grace_period: DEFAULT_TWO_FACTOR_GRACE_PERIOD,
            lfs_enabled: None,
            avatar: None,
        }
    }

    /// Nest the group under a parent.
    pub fn with_parent(mut self, parent_id: GroupId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the avatar file name.
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Enforce two-factor authentication with a grace period.
    pub fn with_two_factor(mut self, grace_period: i64) -> Self {
        self.require_two_factor_authentication = true;
        self.two_factor_grace_period = grace_period;
        self
    }
}

/// Partial update of a group. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub request_access_enabled: Option<bool>,
    #[serde(default)]
    pub require_two_factor_authentication: Option<bool>,
    #[serde(default)]
    pub two_factor_grace_period: Option<i64>,
    #[serde(default)]
    pub lfs_enabled: Option<bool>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl GroupUpdate {
    /// Apply to a copy of `group`, returning the candidate and whether any
    /// two-factor setting actually changed.
    pub(crate) fn apply(&self, group: &Group) -> (Group, bool) {
        let mut next = group.clone();

        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(path) = &self.path {
            next.path = path.clone();
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(visibility) = self.visibility {
            next.visibility = visibility;
        }
        if let Some(enabled) = self.request_access_enabled {
            next.request_access_enabled = enabled;
        }
        if let Some(required) = self.require_two_factor_authentication {
            next.require_two_factor_authentication = required;
        }
        if let Some(period) = self.two_factor_grace_period {
            next.two_factor_grace_period = period;
        }
        if let Some(enabled) = self.lfs_enabled {
            next.lfs_enabled = Some(enabled);
        }
        if let Some(avatar) = &self.avatar {
            next.avatar = Some(avatar.clone());
        }

        let two_factor_changed = next.require_two_factor_authentication
            != group.require_two_factor_authentication
            || next.two_factor_grace_period != group.two_factor_grace_period;

        (next, two_factor_changed)
    }
}
