//! Nested groups and membership resolution for Canopy.
//!
//! This crate provides:
//! - **Groups**: A tree of namespaces with path rules, visibility and avatars
//! - **Memberships**: Direct grants plus access requests awaiting approval
//! - **Resolution**: Effective access levels inherited through ancestors
//! - **Secret Variables**: CI variables scoped to groups and gated by protected refs
//! - **Two-Factor Policy**: Group enforcement cascaded to members
//! - **Project Hooks**: Webhook subscriptions managed by project masters
//!
//! # Example
//!
//! ```
//! use canopy_groups::{AccessLevel, GroupStore, NewGroup, NewProject};
//!
//! let store = GroupStore::new();
//!
//! // Build a two-level hierarchy
//! let acme = store.create_group(NewGroup::new("Acme", "acme")).unwrap();
//! let infra = store
//!     .create_group(NewGroup::new("Infra", "infra").with_parent(acme.id))
//!     .unwrap();
//!
//! // Access granted on the parent is inherited by the subgroup
//! let alice = store.create_user("alice").unwrap();
//! store.add_user(acme.id, alice.id, AccessLevel::Master).unwrap();
//! assert!(store.has_access_at_least(infra.id, alice.id, AccessLevel::Developer));
//!
//! // Protected variables only reach protected refs
//! let api = store
//!     .create_project(NewProject::new("API", "api").in_group(infra.id))
//!     .unwrap();
//! store.set_repository_empty(api.id, false).unwrap();
//! store.create_variable(acme.id, "DEPLOY_KEY", "s3cr3t", true).unwrap();
//! assert!(store.secret_variables_for(infra.id, "feature", api.id).is_empty());
//!
//! let resolver = store.resolver();
//! assert_eq!(resolver.full_path(infra.id).as_deref(), Some("acme/infra"));
//! ```

mod access;
mod error;
mod group;
mod hook;
mod membership;
mod project;
mod protected_ref;
mod resolver;
mod settings;
mod store;
mod two_factor;
pub mod validation;
mod variable;

pub use access::AccessLevel;
pub use error::{GroupError, Result};
pub use group::{Group, GroupUpdate, NewGroup};
pub use hook::{HookAttributes, HookEvent, ProjectHook};
pub use membership::{Membership, MembershipState};
pub use project::{NewProject, Project, ProjectMember};
pub use protected_ref::{ProtectedRef, RefKind};
pub use resolver::Resolver;
pub use settings::{DefaultBranchProtection, Settings};
pub use store::{GroupStore, GroupUpdated};
pub use two_factor::{propagate_two_factor, CascadeReport, TwoFactorRecompute};
pub use validation::{FieldError, PathRejection, ValidationErrors};
pub use variable::SecretVariable;

pub use canopy_types::{GroupId, ProjectId, User, UserId, Visibility};
