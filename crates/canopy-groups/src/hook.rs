//! Project webhooks.

use canopy_types::ProjectId;
use serde::{Deserialize, Serialize};

/// Events that can trigger a project hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    /// Push to a branch.
    Push,
    /// Tag pushed.
    TagPush,
    /// Issue opened, closed, etc.
    Issues,
    /// Merge request opened, merged, etc.
    MergeRequests,
    /// Comment on a commit, issue or merge request.
    Note,
    /// CI job status changed.
    Job,
    /// CI pipeline status changed.
    Pipeline,
    /// Wiki page created or edited.
    WikiPage,
}

impl HookEvent {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "push" => Some(HookEvent::Push),
            "tag_push" => Some(HookEvent::TagPush),
            "issues" | "issue" => Some(HookEvent::Issues),
            "merge_requests" | "merge_request" => Some(HookEvent::MergeRequests),
            "note" => Some(HookEvent::Note),
            "job" | "build" => Some(HookEvent::Job),
            "pipeline" => Some(HookEvent::Pipeline),
            "wiki_page" => Some(HookEvent::WikiPage),
            _ => None,
        }
    }

    /// Get all available events.
    pub fn all() -> Vec<HookEvent> {
        vec![
            HookEvent::Push,
            HookEvent::TagPush,
            HookEvent::Issues,
            HookEvent::MergeRequests,
            HookEvent::Note,
            HookEvent::Job,
            HookEvent::Pipeline,
            HookEvent::WikiPage,
        ]
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookEvent::Push => write!(f, "push"),
            HookEvent::TagPush => write!(f, "tag_push"),
            HookEvent::Issues => write!(f, "issues"),
            HookEvent::MergeRequests => write!(f, "merge_requests"),
            HookEvent::Note => write!(f, "note"),
            HookEvent::Job => write!(f, "job"),
            HookEvent::Pipeline => write!(f, "pipeline"),
            HookEvent::WikiPage => write!(f, "wiki_page"),
        }
    }
}

/// A webhook subscription for a project.
///
/// The token is write-only: it is stored but never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectHook {
    /// Unique hook ID.
    pub id: u64,
    /// Project the hook belongs to.
    pub project_id: ProjectId,
    /// Callback URL.
    pub url: String,
    /// Secret sent with each delivery in the `X-Canopy-Token` header.
    #[serde(skip_serializing, default)]
    pub token: Option<String>,
    pub push_events: bool,
    pub issues_events: bool,
    pub merge_requests_events: bool,
    pub tag_push_events: bool,
    pub note_events: bool,
    pub job_events: bool,
    pub pipeline_events: bool,
    pub wiki_page_events: bool,
    /// Verify the TLS certificate of the callback.
    pub enable_ssl_verification: bool,
    /// When the hook was created (Unix timestamp).
    pub created_at: u64,
    /// When the hook was last updated (Unix timestamp).
    pub updated_at: u64,
}

impl ProjectHook {
    /// Create a hook with the default subscription (push events only).
    pub fn new(id: u64, project_id: ProjectId, url: String) -> Self {
        let now = canopy_types::unix_now();
        Self {
            id,
            project_id,
            url,
            token: None,
            push_events: true,
            issues_events: false,
            merge_requests_events: false,
            tag_push_events: false,
            note_events: false,
            job_events: false,
            pipeline_events: false,
            wiki_page_events: false,
            enable_ssl_verification: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the hook subscribes to an event.
    pub fn should_fire(&self, event: HookEvent) -> bool {
        match event {
            HookEvent::Push => self.push_events,
            HookEvent::TagPush => self.tag_push_events,
            HookEvent::Issues => self.issues_events,
            HookEvent::MergeRequests => self.merge_requests_events,
            HookEvent::Note => self.note_events,
            HookEvent::Job => self.job_events,
            HookEvent::Pipeline => self.pipeline_events,
            HookEvent::WikiPage => self.wiki_page_events,
        }
    }

    /// Apply hook attributes; `url` has already been validated.
    pub(crate) fn apply(&mut self, url: String, attrs: &HookAttributes) {
        self.url = url;
        if let Some(token) = &attrs.token {
            self.token = Some(token.clone());
        }
        let flags = [
            (&mut self.push_events, attrs.push_events),
            (&mut self.issues_events, attrs.issues_events),
            (&mut self.merge_requests_events, attrs.merge_requests_events),
            (&mut self.tag_push_events, attrs.tag_push_events),
            (&mut self.note_events, attrs.note_events),
            (&mut self.job_events, attrs.job_events),
            (&mut self.pipeline_events, attrs.pipeline_events),
            (&mut self.wiki_page_events, attrs.wiki_page_events),
            (&mut self.enable_ssl_verification, attrs.enable_ssl_verification),
        ];
        for (field, value) in flags {
            if let Some(value) = value {
                *field = value;
            }
        }
        self.updated_at = canopy_types::unix_now();
    }
}

/// Attributes accepted when creating or updating a hook.
///
/// `url` is required on both; omitted flags keep their current (or default) value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookAttributes {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub push_events: Option<bool>,
    #[serde(default)]
    pub issues_events: Option<bool>,
    #[serde(default)]
    pub merge_requests_events: Option<bool>,
    #[serde(default)]
    pub tag_push_events: Option<bool>,
    #[serde(default)]
    pub note_events: Option<bool>,
    #[serde(default)]
    pub job_events: Option<bool>,
    #[serde(default)]
    pub pipeline_events: Option<bool>,
    #[serde(default)]
    pub wiki_page_events: Option<bool>,
    #[serde(default)]
    pub enable_ssl_verification: Option<bool>,
}

impl HookAttributes {
    /// Attributes with just a URL.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Subscribe to every event.
    pub fn all_events(mut self) -> Self {
        for event in HookEvent::all() {
            self = self.event(event, true);
        }
        self
    }

    /// Set one event flag.
    pub fn event(mut self, event: HookEvent, enabled: bool) -> Self {
        let slot = match event {
            HookEvent::Push => &mut self.push_events,
            HookEvent::TagPush => &mut self.tag_push_events,
            HookEvent::Issues => &mut self.issues_events,
            HookEvent::MergeRequests => &mut self.merge_requests_events,
            HookEvent::Note => &mut self.note_events,
            HookEvent::Job => &mut self.job_events,
            HookEvent::Pipeline => &mut self.pipeline_events,
            HookEvent::WikiPage => &mut self.wiki_page_events,
        };
        *slot = Some(enabled);
        self
    }

    /// Set the secret token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
