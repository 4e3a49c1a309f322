//! CLI command implementations.
//!
//! Every command returns a JSON value; `main` prints it.

use canopy_groups::{validation, GroupError, GroupStore, Membership, MembershipState};
use serde_json::{json, Value};
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Seed(#[from] serde_yaml::Error),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Unknown project: {0}")]
    UnknownProject(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

fn group_id(store: &GroupStore, full_path: &str) -> Result<u64> {
    store
        .get_group_by_full_path(full_path)
        .map(|g| g.id)
        .ok_or_else(|| CliError::UnknownGroup(full_path.to_string()))
}

fn username(store: &GroupStore, id: u64) -> String {
    store
        .get_user(id)
        .map(|u| u.username)
        .unwrap_or_else(|| format!("#{}", id))
}

fn membership_json(store: &GroupStore, membership: &Membership) -> Value {
    let state = match membership.state {
        MembershipState::Active => "active",
        MembershipState::RequestingAccess => "requesting_access",
    };
    json!({
        "user": username(store, membership.user_id),
        "group": store.resolver().full_path(membership.group_id),
        "access_level": membership.access_level.to_string(),
        "state": state,
    })
}

/// Effective access of a user on a group.
pub fn access(store: &GroupStore, group: &str, user: &str) -> Result<Value> {
    let group_id = group_id(store, group)?;
    let user_record = store
        .get_user_by_username(user)
        .ok_or_else(|| CliError::UnknownUser(user.to_string()))?;

    tracing::info!(group = %group, user = %user, "Resolving access");

    let resolver = store.resolver();
    let level = resolver.effective_access_level(group_id, user_record.id);
    Ok(json!({
        "group": group,
        "user": user,
        "access_level": level.map(|l| l.to_string()),
        "owner": resolver.has_owner(group_id, user_record.id),
        "master": resolver.has_master(group_id, user_record.id),
    }))
}

/// Members of a group, optionally with inherited members or pending requests.
pub fn members(
    store: &GroupStore,
    group: &str,
    with_parents: bool,
    requesters: bool,
) -> Result<Value> {
    let group_id = group_id(store, group)?;
    let rows = {
        let resolver = store.resolver();
        if requesters {
            resolver.requesters(group_id)
        } else if with_parents {
            resolver.members_with_parents(group_id)
        } else {
            resolver.members(group_id)
        }
    };
    Ok(Value::Array(
        rows.iter().map(|m| membership_json(store, m)).collect(),
    ))
}

/// Secret variables a job would receive. Values are masked unless `reveal`.
pub fn variables(
    store: &GroupStore,
    project: &str,
    ref_name: &str,
    reveal: bool,
) -> Result<Value> {
    let project = store
        .get_project_by_full_path(project)
        .ok_or_else(|| CliError::UnknownProject(project.to_string()))?;
    let Some(group) = project.group_id else {
        return Ok(Value::Array(Vec::new()));
    };

    let resolver = store.resolver();
    let protected = resolver.is_ref_protected(project.id, ref_name);
    let vars: Vec<Value> = resolver
        .secret_variables_for(group, ref_name, project.id)
        .into_iter()
        .map(|v| {
            json!({
                "key": v.key,
                "value": if reveal { v.value } else { "*****".to_string() },
                "protected": v.protected,
                "group": resolver.full_path(v.group_id),
            })
        })
        .collect();

    Ok(json!({
        "ref": ref_name,
        "ref_protected": protected,
        "variables": vars,
    }))
}

/// Groups matching a search query.
pub fn search(store: &GroupStore, query: &str) -> Result<Value> {
    let resolver = store.resolver();
    let groups: Vec<Value> = resolver
        .search(query)
        .into_iter()
        .map(|g| {
            json!({
                "id": g.id,
                "name": g.name,
                "full_path": resolver.full_path(g.id),
                "visibility": g.visibility.to_string(),
                "web_url": resolver.web_url(g.id),
            })
        })
        .collect();
    Ok(Value::Array(groups))
}

/// Check whether a path is usable for a group.
pub fn validate_path(path: &str, nested: bool) -> Value {
    match validation::check_group_path(path, !nested) {
        Ok(()) => json!({ "path": path, "valid": true }),
        Err(rejection) => json!({
            "path": path,
            "valid": false,
            "code": rejection.code(),
            "error": format!("Path {}", rejection),
        }),
    }
}
