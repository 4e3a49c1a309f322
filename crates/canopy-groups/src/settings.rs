//! Instance-wide settings injected into the store.

use crate::error::Result;
use canopy_types::DEFAULT_TWO_FACTOR_GRACE_PERIOD;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Protection applied to the default branch of new projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultBranchProtection {
    /// Developers and masters can push, force push and delete.
    None,
    /// Developers can push but not force push or delete.
    DevCanPush,
    /// Only masters can push.
    #[default]
    Full,
    /// Developers can merge but not push.
    DevCanMerge,
}

impl DefaultBranchProtection {
    /// Whether this policy protects every ref of a project whose repository is still empty.
    pub fn protects_empty_repository(&self) -> bool {
        matches!(
            self,
            DefaultBranchProtection::Full | DefaultBranchProtection::DevCanMerge
        )
    }
}

/// Settings for a Canopy instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Whether Git LFS is enabled instance-wide.
    pub lfs_enabled: bool,
    /// Default branch protection policy.
    pub default_branch_protection: DefaultBranchProtection,
    /// Grace period (hours) used when no enforcing group sets one.
    pub two_factor_grace_period: i64,
    /// Base URL of the instance (e.g. `https://code.example.com`).
    pub host: String,
    /// Optional CDN host for uploaded assets.
    pub asset_host: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lfs_enabled: true,
            default_branch_protection: DefaultBranchProtection::Full,
            two_factor_grace_period: DEFAULT_TWO_FACTOR_GRACE_PERIOD,
            host: "http://localhost".to_string(),
            asset_host: None,
        }
    }
}

impl Settings {
    /// Parse settings from YAML. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load settings from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::GroupError::Serialization(format!(
                "reading {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Host without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.host.trim_end_matches('/')
    }
}
