//! YAML seed files describing a group hierarchy.
//!
//! Groups are created in file order, so parents must come before their
//! subgroups. Groups and projects are referenced by full path, users by
//! username.

use crate::commands::{CliError, Result};
use canopy_groups::{AccessLevel, GroupStore, NewGroup, NewProject, RefKind, Settings, UserId};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Contents of a seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub settings: Settings,
    pub users: Vec<SeedUser>,
    pub groups: Vec<SeedGroup>,
    pub members: Vec<SeedMember>,
    pub requests: Vec<SeedRequest>,
    pub variables: Vec<SeedVariable>,
    pub projects: Vec<SeedProject>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedGroup {
    /// Full path of the parent group.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(flatten)]
    pub group: NewGroup,
}

#[derive(Debug, Deserialize)]
pub struct SeedMember {
    pub group: String,
    pub user: String,
    pub level: AccessLevel,
}

#[derive(Debug, Deserialize)]
pub struct SeedRequest {
    pub group: String,
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedVariable {
    pub group: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeedProject {
    pub name: String,
    pub path: String,
    /// Full path of the owning group.
    #[serde(default)]
    pub group: Option<String>,
    /// Whether the repository has no commits yet.
    #[serde(default)]
    pub empty: bool,
    #[serde(default)]
    pub protected_branches: Vec<String>,
    #[serde(default)]
    pub protected_tags: Vec<String>,
}

impl Seed {
    /// Parse a seed from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a seed file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Build a populated store.
    pub fn into_store(self) -> Result<GroupStore> {
        let store = GroupStore::with_settings(self.settings);
        let mut users: HashMap<String, UserId> = HashMap::new();

        for user in self.users {
            let created = store.create_user(user.username.clone())?;
            users.insert(user.username, created.id);
        }
        let user_id = |username: &str| {
            users
                .get(username)
                .copied()
                .ok_or_else(|| CliError::UnknownUser(username.to_string()))
        };
        let group_id = |full_path: &str| {
            store
                .get_group_by_full_path(full_path)
                .map(|g| g.id)
                .ok_or_else(|| CliError::UnknownGroup(full_path.to_string()))
        };

        for SeedGroup { parent, mut group } in self.groups {
            group.parent_id = parent.as_deref().map(group_id).transpose()?;
            store.create_group(group)?;
        }

        for member in &self.members {
            store.add_user(group_id(&member.group)?, user_id(&member.user)?, member.level)?;
        }

        for request in &self.requests {
            store.request_access(group_id(&request.group)?, user_id(&request.user)?)?;
        }

        for var in self.variables {
            store.create_variable(group_id(&var.group)?, var.key, var.value, var.protected)?;
        }

        for project in self.projects {
            let mut new = NewProject::new(project.name, project.path);
            if let Some(group) = &project.group {
                new = new.in_group(group_id(group)?);
            }
            let created = store.create_project(new)?;
            store.set_repository_empty(created.id, project.empty)?;

            for branch in project.protected_branches {
                store.protect_ref(created.id, RefKind::Branch, branch)?;
            }
            for tag in project.protected_tags {
                store.protect_ref(created.id, RefKind::Tag, tag)?;
            }
        }

        tracing::info!(
            users = users.len(),
            groups = store.list_groups().len(),
            "seed loaded"
        );
        Ok(store)
    }
}

/// Sample seed shared by the CLI tests.
#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"
settings:
  host: https://code.example.com
users:
  - username: alice
  - username: bob
  - username: carol
groups:
  - name: Acme
    path: acme
  - name: Infra
    path: infra
    parent: acme
members:
  - { group: acme, user: alice, level: owner }
  - { group: acme/infra, user: bob, level: developer }
requests:
  - { group: acme/infra, user: carol }
variables:
  - { group: acme, key: DEPLOY_KEY, value: s3cr3t, protected: true }
  - { group: acme/infra, key: REGION, value: eu-west-1 }
projects:
  - name: API
    path: api
    group: acme/infra
    protected_branches: [main]
"#;
