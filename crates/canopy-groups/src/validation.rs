//! Field validation for groups, variables and hooks.
//!
//! Validation never touches the store: callers collect [`FieldError`]s into
//! a [`ValidationErrors`] and refuse to persist when it is non-empty.
//!
//! Group paths become URL segments, so they must not shadow routes the
//! platform serves itself:
//!
//! - top-level groups live next to the application's root routes
//!   (`/api`, `/admin`, `/uploads`, ...)
//! - nested groups live next to project routes that follow a wildcard
//!   (`/:namespace/:project/tree/...`)
//! - group routes (`/groups/:id/activity`, ...) are reserved at every level

use mime_guess::mime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Valid group path: alphanumerics, `_`, `.` and `-`, not starting with `-`.
pub static PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.][a-zA-Z0-9_.-]*$").expect("Invalid regex"));

/// Valid secret variable key.
pub static VARIABLE_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("Invalid regex"));

/// Routes served at the root of the application.
pub const TOP_LEVEL_ROUTES: &[&str] = &[
    "-",
    ".well-known",
    "abuse_reports",
    "admin",
    "all",
    "api",
    "assets",
    "autocomplete",
    "ci",
    "dashboard",
    "explore",
    "files",
    "groups",
    "health_check",
    "help",
    "hooks",
    "import",
    "invites",
    "issues",
    "jwt",
    "member",
    "merge_requests",
    "new",
    "notes",
    "notification_settings",
    "oauth",
    "profile",
    "projects",
    "public",
    "repository",
    "robots.txt",
    "s",
    "search",
    "sent_notifications",
    "services",
    "snippets",
    "teams",
    "u",
    "unsubscribes",
    "uploads",
    "users",
];

/// Project routes that follow a wildcard segment.
pub const WILDCARD_ROUTES: &[&str] = &[
    "badges",
    "blame",
    "blob",
    "builds",
    "commits",
    "create",
    "create_dir",
    "edit",
    "files",
    "find_file",
    "new",
    "preview",
    "raw",
    "refs",
    "tree",
    "update",
    "wikis",
];

/// Routes served below a group.
pub const GROUP_ROUTES: &[&str] = &[
    "activity",
    "analytics",
    "audit_events",
    "avatar",
    "edit",
    "group_members",
    "hooks",
    "issues",
    "labels",
    "ldap",
    "ldap_group_links",
    "merge_requests",
    "milestones",
    "notification_setting",
    "pipeline_quota",
    "projects",
    "subgroups",
];

/// File extensions accepted for avatars.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "ico"];

/// Maximum length of names, paths and variable keys.
pub const MAX_NAME_LENGTH: usize = 255;

/// Field-level validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name.
    pub field: String,
    /// Error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// A collection of field errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error on a field.
    pub fn add(&mut self, field: &str, code: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            code: code.to_string(),
            message: message.into(),
        });
    }

    /// Whether no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// All recorded errors.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Messages recorded for one field.
    pub fn on(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{} {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Why a group path was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    /// Empty or whitespace only.
    Blank,
    /// Too long.
    TooLong,
    /// Contains characters outside the allowed set or a forbidden suffix.
    Format,
    /// Collides with a root route (top-level groups only).
    TopLevelRoute,
    /// Collides with a project wildcard route (nested groups only).
    WildcardRoute,
    /// Collides with a group route.
    GroupRoute,
}

impl PathRejection {
    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            PathRejection::Blank => "blank",
            PathRejection::TooLong => "too_long",
            PathRejection::Format => "format",
            PathRejection::TopLevelRoute
            | PathRejection::WildcardRoute
            | PathRejection::GroupRoute => "reserved",
        }
    }
}

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRejection::Blank => write!(f, "can't be blank"),
            PathRejection::TooLong => {
                write!(f, "is too long (maximum is {} characters)", MAX_NAME_LENGTH)
            }
            PathRejection::Format => write!(
                f,
                "can contain only letters, digits, '_', '-' and '.', \
                 cannot start with '-' or end in '.git' or '.atom'"
            ),
            PathRejection::TopLevelRoute
            | PathRejection::WildcardRoute
            | PathRejection::GroupRoute => write!(f, "is a reserved name"),
        }
    }
}

fn reserved(routes: &[&str], path: &str) -> bool {
    routes.iter().any(|r| r.eq_ignore_ascii_case(path))
}

/// Check a group path against the format and reserved-route rules.
///
/// `top_level` is true when the group has no parent.
pub fn check_group_path(path: &str, top_level: bool) -> std::result::Result<(), PathRejection> {
    if path.trim().is_empty() {
        return Err(PathRejection::Blank);
    }
    if path.len() > MAX_NAME_LENGTH {
        return Err(PathRejection::TooLong);
    }
    let lower = path.to_lowercase();
    if !PATH_REGEX.is_match(path) || lower.ends_with(".git") || lower.ends_with(".atom") {
        return Err(PathRejection::Format);
    }

    if top_level {
        if reserved(TOP_LEVEL_ROUTES, path) {
            return Err(PathRejection::TopLevelRoute);
        }
    } else if reserved(WILDCARD_ROUTES, path) {
        return Err(PathRejection::WildcardRoute);
    }

    if reserved(GROUP_ROUTES, path) {
        return Err(PathRejection::GroupRoute);
    }

    Ok(())
}

/// Whether a file name looks like an image we accept as an avatar.
pub fn is_image_file(file: &str) -> bool {
    let extension = match file.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return false,
    };
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return false;
    }
    mime_guess::from_path(file)
        .first()
        .map(|m| m.type_() == mime::IMAGE)
        .unwrap_or(false)
}

/// Check a secret variable key.
pub fn check_variable_key(key: &str) -> std::result::Result<(), &'static str> {
    if key.is_empty() {
        return Err("can't be blank");
    }
    if key.len() > MAX_NAME_LENGTH {
        return Err("is too long (maximum is 255 characters)");
    }
    if !VARIABLE_KEY_REGEX.is_match(key) {
        return Err("can contain only letters, digits and '_'");
    }
    Ok(())
}

/// Check a hook callback URL: it must parse and use http or https.
pub fn check_hook_url(raw: &str) -> std::result::Result<(), &'static str> {
    let url = Url::parse(raw).map_err(|_| "is not a valid URL")?;
    match url.scheme() {
        "http" | "https" => {}
        _ => return Err("is blocked: only allowed schemes are http, https"),
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err("is not a valid URL");
    }
    Ok(())
}
