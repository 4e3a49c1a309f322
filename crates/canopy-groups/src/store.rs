//! In-memory group store.

use crate::{
    access::AccessLevel,
    error::{GroupError, Result},
    group::{Group, GroupUpdate, NewGroup},
    hook::{HookAttributes, HookEvent, ProjectHook},
    membership::Membership,
    project::{NewProject, Project, ProjectMember},
    protected_ref::{ProtectedRef, RefKind},
    resolver::Resolver,
    settings::Settings,
    two_factor::{propagate_two_factor, TwoFactorRecompute},
    validation::{self, ValidationErrors},
    variable::SecretVariable,
};
use canopy_types::{GroupId, ProjectId, User, UserId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// All persisted records. Guarded by a single lock so that resolution
/// always sees one consistent snapshot.
#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) groups: HashMap<GroupId, Group>,
    /// Memberships by (group, user) pair.
    pub(crate) memberships: HashMap<(GroupId, UserId), Membership>,
    pub(crate) variables: HashMap<u64, SecretVariable>,
    pub(crate) projects: HashMap<ProjectId, Project>,
    /// Direct project members by (project, user) pair.
    pub(crate) project_members: HashMap<(ProjectId, UserId), ProjectMember>,
    pub(crate) protected_refs: HashMap<u64, ProtectedRef>,
    pub(crate) hooks: HashMap<u64, ProjectHook>,
}

/// Result of a group update.
#[derive(Debug, Clone)]
pub struct GroupUpdated {
    /// The group as persisted.
    pub group: Group,
    /// Active members whose two-factor requirement must be recomputed.
    /// Empty unless a two-factor setting changed.
    pub two_factor_users: Vec<UserId>,
}

/// Thread-safe in-memory store for groups, memberships, variables and projects.
#[derive(Debug, Default)]
pub struct GroupStore {
    /// Next available ID for new entities.
    next_id: AtomicU64,

    state: RwLock<State>,

    settings: Settings,
}

impl GroupStore {
    /// Create an empty store with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with the given settings.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            state: RwLock::new(State::default()),
            settings,
        }
    }

    /// Instance settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Take a consistent read snapshot for resolution queries.
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.state.read(), &self.settings)
    }

    /// Generate a new unique ID.
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ==================== Users ====================

    /// Create a user.
    pub fn create_user(&self, username: impl Into<String>) -> Result<User> {
        let username = username.into();
        if username.trim().is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add("username", "blank", "can't be blank");
            return Err(errors.into());
        }

        let mut state = self.state.write();
        if state.users.values().any(|u| u.username == username) {
            return Err(GroupError::AlreadyExists(format!("user '{}'", username)));
        }

        let mut user = User::new(self.next_id(), username);
        user.two_factor_grace_period = self.settings.two_factor_grace_period;
        state.users.insert(user.id, user.clone());

        tracing::info!(user = user.id, username = %user.username, "user created");
        Ok(user)
    }

    /// Get a user by ID.
    pub fn get_user(&self, id: UserId) -> Option<User> {
        self.state.read().users.get(&id).cloned()
    }

    /// Get a user by username.
    pub fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.state
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    /// Delete a user together with all of their memberships.
    pub fn delete_user(&self, id: UserId) -> Result<()> {
        let mut state = self.state.write();
        state
            .users
            .remove(&id)
            .ok_or_else(|| GroupError::NotFound(format!("user {}", id)))?;

        state.memberships.retain(|(_, user), _| *user != id);
        state.project_members.retain(|(_, user), _| *user != id);

        tracing::info!(user = id, "user deleted");
        Ok(())
    }

    // ==================== Groups ====================

    fn validate_group(
        state: &State,
        candidate: &Group,
    ) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        candidate.validate_attributes(&mut errors);

        if let Some(parent) = candidate.parent_id {
            if !state.groups.contains_key(&parent) {
                errors.add("parent", "missing", "does not exist");
            }
        }

        let siblings = state
            .groups
            .values()
            .filter(|g| g.id != candidate.id && g.parent_id == candidate.parent_id);
        for sibling in siblings {
            if sibling.path.eq_ignore_ascii_case(&candidate.path) {
                errors.add("path", "taken", "has already been taken");
            }
            if sibling.name == candidate.name {
                errors.add("name", "taken", "has already been taken");
            }
        }

        errors.into_result()
    }

    /// Validate and create a group.
    pub fn create_group(&self, new: NewGroup) -> Result<Group> {
        let mut state = self.state.write();
        let id = self.next_id();
        let group = Group::from_new(id, new);

        Self::validate_group(&state, &group)?;

        state.groups.insert(id, group.clone());
        tracing::info!(
            group = id,
            path = %group.path,
            parent = ?group.parent_id,
            "group created"
        );
        Ok(group)
    }

    /// Get a group by ID.
    pub fn get_group(&self, id: GroupId) -> Option<Group> {
        self.state.read().groups.get(&id).cloned()
    }

    /// Get a group by its full path, e.g. `acme/platform`.
    pub fn get_group_by_full_path(&self, full_path: &str) -> Option<Group> {
        let state = self.state.read();
        state
            .groups
            .values()
            .find(|g| {
                state
                    .full_path(g.id)
                    .map(|p| p.eq_ignore_ascii_case(full_path))
                    .unwrap_or(false)
            })
            .cloned()
    }

    /// List all groups.
    pub fn list_groups(&self) -> Vec<Group> {
        self.state.read().groups_where(|_| true)
    }

    /// Update a group.
    ///
    /// When the update changes `require_two_factor_authentication` or
    /// `two_factor_grace_period`, the result lists every active member once;
    /// pass it to [`propagate_two_factor`].
    pub fn update_group(&self, id: GroupId, update: GroupUpdate) -> Result<GroupUpdated> {
        let mut state = self.state.write();
        let current = state
            .groups
            .get(&id)
            .ok_or_else(|| GroupError::NotFound(format!("group {}", id)))?;

        let (mut next, two_factor_changed) = update.apply(current);
        Self::validate_group(&state, &next)?;

        next.updated_at = canopy_types::unix_now();
        state.groups.insert(id, next.clone());

        let two_factor_users = if two_factor_changed {
            let mut users: Vec<UserId> = state.members(id).into_iter().map(|m| m.user_id).collect();
            users.sort_unstable();
            users.dedup();
            users
        } else {
            Vec::new()
        };

        tracing::info!(
            group = id,
            two_factor_changed = two_factor_changed,
            affected = two_factor_users.len(),
            "group updated"
        );
        Ok(GroupUpdated {
            group: next,
            two_factor_users,
        })
    }

    /// Delete a group, its subgroups, and everything they own.
    pub fn delete_group(&self, id: GroupId) -> Result<()> {
        let affected = {
            let mut state = self.state.write();
            let doomed: HashSet<GroupId> = state.descendant_ids(id).into_iter().collect();
            if doomed.is_empty() {
                return Err(GroupError::NotFound(format!("group {}", id)));
            }

            let mut affected: Vec<UserId> = state
                .memberships
                .values()
                .filter(|m| doomed.contains(&m.group_id) && m.is_active())
                .map(|m| m.user_id)
                .collect();
            affected.sort_unstable();
            affected.dedup();

            let projects: HashSet<ProjectId> = state
                .projects
                .values()
                .filter(|p| p.group_id.map(|g| doomed.contains(&g)).unwrap_or(false))
                .map(|p| p.id)
                .collect();

            state.groups.retain(|g, _| !doomed.contains(g));
            state.memberships.retain(|(g, _), _| !doomed.contains(g));
            state.variables.retain(|_, v| !doomed.contains(&v.group_id));
            state.projects.retain(|p, _| !projects.contains(p));
            state.project_members.retain(|(p, _), _| !projects.contains(p));
            state.protected_refs.retain(|_, r| !projects.contains(&r.project_id));
            state.hooks.retain(|_, h| !projects.contains(&h.project_id));

            tracing::info!(
                group = id,
                groups = doomed.len(),
                projects = projects.len(),
                "group deleted"
            );
            affected
        };

        propagate_two_factor(&affected, self);
        Ok(())
    }

    // ==================== Memberships ====================

    /// Add a user to a group at `level`, or change their level.
    ///
    /// A pending access request is accepted. The user's two-factor
    /// requirement is recomputed, since an ancestor or descendant of the
    /// group may enforce it.
    pub fn add_user(&self, group: GroupId, user: UserId, level: AccessLevel) -> Result<Membership> {
        let membership = {
            let mut state = self.state.write();
            if !state.groups.contains_key(&group) {
                return Err(GroupError::NotFound(format!("group {}", group)));
            }
            if !state.users.contains_key(&user) {
                return Err(GroupError::NotFound(format!("user {}", user)));
            }

            state
                .memberships
                .entry((group, user))
                .and_modify(|m| m.grant(level))
                .or_insert_with(|| Membership::active(self.next_id(), group, user, level))
                .clone()
        };

        tracing::info!(group = group, user = user, level = %level, "member added");

        if let Err(e) = self.update_two_factor_requirement(user) {
            tracing::warn!(user = user, error = %e, "two-factor recomputation failed");
        }
        Ok(membership)
    }

    /// Add several users at the same level.
    pub fn add_users(
        &self,
        group: GroupId,
        users: &[UserId],
        level: AccessLevel,
    ) -> Result<Vec<Membership>> {
        users
            .iter()
            .map(|&user| self.add_user(group, user, level))
            .collect()
    }

    /// Request access to a group. Repeating a pending request returns it unchanged.
    pub fn request_access(&self, group: GroupId, user: UserId) -> Result<Membership> {
        let mut state = self.state.write();
        let target = state
            .groups
            .get(&group)
            .ok_or_else(|| GroupError::NotFound(format!("group {}", group)))?;
        if !target.request_access_enabled {
            return Err(GroupError::PermissionDenied(format!(
                "group '{}' does not accept access requests",
                target.path
            )));
        }
        if !state.users.contains_key(&user) {
            return Err(GroupError::NotFound(format!("user {}", user)));
        }

        if let Some(existing) = state.memberships.get(&(group, user)) {
            if existing.is_request() {
                return Ok(existing.clone());
            }
            return Err(GroupError::AlreadyExists(format!(
                "membership of user {} in group {}",
                user, group
            )));
        }

        let request = Membership::request(self.next_id(), group, user);
        state.memberships.insert((group, user), request.clone());

        tracing::info!(group = group, user = user, "access requested");
        Ok(request)
    }

    /// Remove a membership or withdraw a request.
    ///
    /// Removing an active membership recomputes the user's two-factor
    /// requirement. Withdrawing a request leaves it untouched.
    pub fn remove_member(&self, group: GroupId, user: UserId) -> Result<Membership> {
        let removed = self
            .state
            .write()
            .memberships
            .remove(&(group, user))
            .ok_or_else(|| GroupError::NotFound(format!("member {} in group {}", user, group)))?;

        tracing::info!(group = group, user = user, "member removed");

        if removed.is_active() {
            if let Err(e) = self.update_two_factor_requirement(user) {
                tracing::warn!(user = user, error = %e, "two-factor recomputation failed");
            }
        }
        Ok(removed)
    }

    // ==================== Secret Variables ====================

    /// Create a secret variable on a group.
    pub fn create_variable(
        &self,
        group: GroupId,
        key: impl Into<String>,
        value: impl Into<String>,
        protected: bool,
    ) -> Result<SecretVariable> {
        let key = key.into();
        let mut state = self.state.write();
        if !state.groups.contains_key(&group) {
            return Err(GroupError::NotFound(format!("group {}", group)));
        }

        let mut errors = ValidationErrors::new();
        if let Err(message) = validation::check_variable_key(&key) {
            errors.add("key", "invalid", message);
        }
        if state
            .variables
            .values()
            .any(|v| v.group_id == group && v.key == key)
        {
            errors.add("key", "taken", "has already been taken");
        }
        errors.into_result()?;

        let variable = SecretVariable {
            id: self.next_id(),
            group_id: group,
            key,
            value: value.into(),
            protected,
        };
        state.variables.insert(variable.id, variable.clone());

        tracing::info!(
            group = group,
            key = %variable.key,
            protected = protected,
            "secret variable created"
        );
        Ok(variable)
    }

    /// Variables owned directly by a group, in creation order.
    pub fn list_variables(&self, group: GroupId) -> Vec<SecretVariable> {
        let state = self.state.read();
        let mut vars: Vec<SecretVariable> = state
            .variables
            .values()
            .filter(|v| v.group_id == group)
            .cloned()
            .collect();
        vars.sort_by_key(|v| v.id);
        vars
    }

    /// Delete a secret variable.
    pub fn delete_variable(&self, id: u64) -> Result<()> {
        self.state
            .write()
            .variables
            .remove(&id)
            .ok_or_else(|| GroupError::NotFound(format!("variable {}", id)))?;
        Ok(())
    }

    // ==================== Projects ====================

    /// Create a project, optionally inside a group.
    pub fn create_project(&self, new: NewProject) -> Result<Project> {
        let mut state = self.state.write();

        let mut errors = ValidationErrors::new();
        if new.name.trim().is_empty() {
            errors.add("name", "blank", "can't be blank");
        }
        if !validation::PATH_REGEX.is_match(&new.path) {
            errors.add("path", "format", "can contain only letters, digits, '_', '-' and '.'");
        }
        if let Some(group) = new.group_id {
            if !state.groups.contains_key(&group) {
                errors.add("namespace", "missing", "does not exist");
            }
        }
        if state
            .projects
            .values()
            .any(|p| p.group_id == new.group_id && p.path.eq_ignore_ascii_case(&new.path))
        {
            errors.add("path", "taken", "has already been taken");
        }
        errors.into_result()?;

        let project = Project::new(self.next_id(), new.name, new.path, new.group_id);
        state.projects.insert(project.id, project.clone());

        tracing::info!(project = project.id, group = ?project.group_id, "project created");
        Ok(project)
    }

    /// Get a project by ID.
    pub fn get_project(&self, id: ProjectId) -> Option<Project> {
        self.state.read().projects.get(&id).cloned()
    }

    /// Get a project by `namespace/path`, or by bare path for projects
    /// outside any group.
    pub fn get_project_by_full_path(&self, full_path: &str) -> Option<Project> {
        let (group, path) = match full_path.rsplit_once('/') {
            Some((namespace, path)) => (Some(self.get_group_by_full_path(namespace)?.id), path),
            None => (None, full_path),
        };
        self.state
            .read()
            .projects
            .values()
            .find(|p| p.group_id == group && p.path.eq_ignore_ascii_case(path))
            .cloned()
    }

    /// Record whether the project repository is empty.
    pub fn set_repository_empty(&self, project: ProjectId, empty: bool) -> Result<Project> {
        let mut state = self.state.write();
        let project = state
            .projects
            .get_mut(&project)
            .ok_or_else(|| GroupError::NotFound(format!("project {}", project)))?;
        project.empty_repo = empty;
        project.updated_at = canopy_types::unix_now();
        Ok(project.clone())
    }

    /// Grant a user direct access to a project, or change their level.
    pub fn add_project_member(
        &self,
        project: ProjectId,
        user: UserId,
        level: AccessLevel,
    ) -> Result<ProjectMember> {
        let mut state = self.state.write();
        if !state.projects.contains_key(&project) {
            return Err(GroupError::NotFound(format!("project {}", project)));
        }
        if !state.users.contains_key(&user) {
            return Err(GroupError::NotFound(format!("user {}", user)));
        }

        let member = state
            .project_members
            .entry((project, user))
            .and_modify(|m| m.access_level = level)
            .or_insert_with(|| ProjectMember::new(project, user, level))
            .clone();
        Ok(member)
    }

    /// Remove a direct project member.
    pub fn remove_project_member(&self, project: ProjectId, user: UserId) -> Result<()> {
        self.state
            .write()
            .project_members
            .remove(&(project, user))
            .ok_or_else(|| {
                GroupError::NotFound(format!("member {} of project {}", user, project))
            })?;
        Ok(())
    }

    // ==================== Protected Refs ====================

    /// Protect a branch or tag name (or pattern). Protecting an already
    /// protected name returns the existing rule.
    pub fn protect_ref(
        &self,
        project: ProjectId,
        kind: RefKind,
        name: impl Into<String>,
    ) -> Result<ProtectedRef> {
        let name = name.into();
        let mut state = self.state.write();
        if !state.projects.contains_key(&project) {
            return Err(GroupError::NotFound(format!("project {}", project)));
        }
        if name.trim().is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add("name", "blank", "can't be blank");
            return Err(errors.into());
        }

        if let Some(existing) = state
            .protected_refs
            .values()
            .find(|r| r.project_id == project && r.kind == kind && r.name == name)
        {
            return Ok(existing.clone());
        }

        let rule = ProtectedRef::new(self.next_id(), project, kind, name);
        state.protected_refs.insert(rule.id, rule.clone());
        Ok(rule)
    }

    /// Remove a protection rule.
    pub fn unprotect_ref(&self, id: u64) -> Result<()> {
        self.state
            .write()
            .protected_refs
            .remove(&id)
            .ok_or_else(|| GroupError::NotFound(format!("protected ref {}", id)))?;
        Ok(())
    }

    /// Protection rules of a project.
    pub fn list_protected_refs(&self, project: ProjectId) -> Vec<ProtectedRef> {
        self.state.read().protected_refs_for(project)
    }

    // ==================== Project Hooks ====================

    fn authorize_project(
        state: &State,
        actor: UserId,
        project: ProjectId,
        required: AccessLevel,
    ) -> Result<()> {
        if !state.projects.contains_key(&project) {
            return Err(GroupError::NotFound(format!("project {}", project)));
        }
        match state.project_access_level(project, actor) {
            Some(level) if level.has(required) => Ok(()),
            _ => Err(GroupError::PermissionDenied(format!(
                "{} access to project {} required",
                required, project
            ))),
        }
    }

    fn hook_url(attrs: &HookAttributes) -> Result<String> {
        let url = match attrs.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => return Err(GroupError::MissingParameter("url".into())),
        };
        if let Err(message) = validation::check_hook_url(&url) {
            let mut errors = ValidationErrors::new();
            errors.add("url", "invalid", message);
            return Err(errors.into());
        }
        Ok(url)
    }

    fn find_hook<'s>(state: &'s State, project: ProjectId, hook: u64) -> Result<&'s ProjectHook> {
        state
            .hooks
            .get(&hook)
            .filter(|h| h.project_id == project)
            .ok_or_else(|| GroupError::NotFound(format!("hook {}", hook)))
    }

    /// List the hooks of a project. Requires Master.
    pub fn list_project_hooks(
        &self,
        actor: UserId,
        project: ProjectId,
    ) -> Result<Vec<ProjectHook>> {
        let state = self.state.read();
        Self::authorize_project(&state, actor, project, AccessLevel::Master)?;

        let mut hooks: Vec<ProjectHook> = state
            .hooks
            .values()
            .filter(|h| h.project_id == project)
            .cloned()
            .collect();
        hooks.sort_by_key(|h| h.id);
        Ok(hooks)
    }

    /// Get one hook of a project. Requires Master.
    pub fn get_project_hook(
        &self,
        actor: UserId,
        project: ProjectId,
        hook: u64,
    ) -> Result<ProjectHook> {
        let state = self.state.read();
        Self::authorize_project(&state, actor, project, AccessLevel::Master)?;
        Self::find_hook(&state, project, hook).cloned()
    }

    /// Create a hook. Requires Master and an http(s) URL.
    pub fn create_project_hook(
        &self,
        actor: UserId,
        project: ProjectId,
        attrs: HookAttributes,
    ) -> Result<ProjectHook> {
        let mut state = self.state.write();
        Self::authorize_project(&state, actor, project, AccessLevel::Master)?;
        let url = Self::hook_url(&attrs)?;

        let mut hook = ProjectHook::new(self.next_id(), project, url.clone());
        hook.apply(url, &attrs);
        state.hooks.insert(hook.id, hook.clone());

        tracing::info!(project = project, hook = hook.id, "project hook created");
        Ok(hook)
    }

    /// Update a hook. Requires Master; the URL must be supplied again.
    pub fn update_project_hook(
        &self,
        actor: UserId,
        project: ProjectId,
        hook: u64,
        attrs: HookAttributes,
    ) -> Result<ProjectHook> {
        let mut state = self.state.write();
        Self::authorize_project(&state, actor, project, AccessLevel::Master)?;
        let url = Self::hook_url(&attrs)?;
        Self::find_hook(&state, project, hook)?;

        let existing = state
            .hooks
            .get_mut(&hook)
            .ok_or_else(|| GroupError::NotFound(format!("hook {}", hook)))?;
        existing.apply(url, &attrs);

        tracing::info!(project = project, hook = hook, "project hook updated");
        Ok(existing.clone())
    }

    /// Delete a hook. Requires Master.
    pub fn delete_project_hook(&self, actor: UserId, project: ProjectId, hook: u64) -> Result<()> {
        let mut state = self.state.write();
        Self::authorize_project(&state, actor, project, AccessLevel::Master)?;
        Self::find_hook(&state, project, hook)?;
        state.hooks.remove(&hook);

        tracing::info!(project = project, hook = hook, "project hook deleted");
        Ok(())
    }

    /// Hooks of a project subscribed to an event.
    pub fn hooks_for_event(&self, project: ProjectId, event: HookEvent) -> Vec<ProjectHook> {
        let mut hooks: Vec<ProjectHook> = self
            .state
            .read()
            .hooks
            .values()
            .filter(|h| h.project_id == project && h.should_fire(event))
            .cloned()
            .collect();
        hooks.sort_by_key(|h| h.id);
        hooks
    }

    // ==================== Resolution ====================

    /// Highest active level the user holds on the group or any ancestor.
    pub fn effective_access_level(&self, group: GroupId, user: UserId) -> Option<AccessLevel> {
        self.resolver().effective_access_level(group, user)
    }

    /// Check if a user has at least the required level on a group.
    pub fn has_access_at_least(&self, group: GroupId, user: UserId, level: AccessLevel) -> bool {
        self.resolver().has_access_at_least(group, user, level)
    }

    /// Secret variables visible to a job of `project` on `ref_name`.
    pub fn secret_variables_for(
        &self,
        group: GroupId,
        ref_name: &str,
        project: ProjectId,
    ) -> Vec<SecretVariable> {
        self.resolver().secret_variables_for(group, ref_name, project)
    }
}

impl TwoFactorRecompute for GroupStore {
    fn update_two_factor_requirement(&self, user: UserId) -> Result<()> {
        let mut state = self.state.write();
        let periods = state.two_factor_periods_for(user);
        let record = state
            .users
            .get_mut(&user)
            .ok_or_else(|| GroupError::NotFound(format!("user {}", user)))?;

        record.apply_two_factor_requirement(&periods, self.settings.two_factor_grace_period);
        tracing::debug!(
            user = user,
            required = record.require_two_factor_authentication_from_group,
            grace_period = record.two_factor_grace_period,
            "two-factor requirement recomputed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_types::DEFAULT_TWO_FACTOR_GRACE_PERIOD;

    fn store_with_group() -> (GroupStore, Group) {
        let store = GroupStore::new();
        let group = store.create_group(NewGroup::new("Acme", "acme")).unwrap();
        (store, group)
    }

    #[test]
    fn test_group_crud() {
        let (store, group) = store_with_group();
        assert_eq!(store.get_group(group.id).unwrap().path, "acme");

        // Duplicate path among top-level groups fails
        let err = store.create_group(NewGroup::new("Other", "ACME")).unwrap_err();
        assert_eq!(err.validation_errors().unwrap().on("path"), vec!["has already been taken"]);

        // Same path under a different parent is fine
        let child = store
            .create_group(NewGroup::new("Acme", "acme").with_parent(group.id))
            .unwrap();
        assert_eq!(store.get_group_by_full_path("acme/acme").unwrap().id, child.id);

        let updated = store
            .update_group(
                group.id,
                GroupUpdate {
                    description: Some("Rockets".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.group.description.as_deref(), Some("Rockets"));
        assert!(updated.two_factor_users.is_empty());

        store.delete_group(group.id).unwrap();
        assert!(store.get_group(group.id).is_none());
        assert!(store.get_group(child.id).is_none());
        assert!(store.delete_group(group.id).is_err());
    }

    #[test]
    fn test_name_unique_within_parent() {
        let (store, _) = store_with_group();
        let err = store.create_group(NewGroup::new("Acme", "acme-2")).unwrap_err();
        assert_eq!(err.validation_errors().unwrap().on("name"), vec!["has already been taken"]);
    }

    #[test]
    fn test_missing_parent() {
        let store = GroupStore::new();
        let err = store
            .create_group(NewGroup::new("Orphan", "orphan").with_parent(99))
            .unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.validation_errors().unwrap().on("parent"), vec!["does not exist"]);
    }

    #[test]
    fn test_add_user_upserts() {
        let (store, group) = store_with_group();
        let user = store.create_user("alice").unwrap();

        let first = store.add_user(group.id, user.id, AccessLevel::Guest).unwrap();
        let second = store.add_user(group.id, user.id, AccessLevel::Developer).unwrap();

        assert_eq!(first.id, second.id);
        let members = store.resolver().members(group.id);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].access_level, AccessLevel::Developer);
    }

    #[test]
    fn test_request_access() {
        let (store, group) = store_with_group();
        let user = store.create_user("bob").unwrap();

        let request = store.request_access(group.id, user.id).unwrap();
        assert!(request.is_request());
        assert_eq!(store.request_access(group.id, user.id).unwrap().id, request.id);
        assert!(store.effective_access_level(group.id, user.id).is_none());

        // Adding the requester accepts the request
        store.add_user(group.id, user.id, AccessLevel::Reporter).unwrap();
        assert!(store.resolver().requesters(group.id).is_empty());
        assert_eq!(
            store.effective_access_level(group.id, user.id),
            Some(AccessLevel::Reporter)
        );

        // Members cannot request again
        assert!(matches!(
            store.request_access(group.id, user.id),
            Err(GroupError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_request_access_disabled() {
        let store = GroupStore::new();
        let mut new = NewGroup::new("Closed", "closed");
        new.request_access_enabled = false;
        let group = store.create_group(new).unwrap();
        let user = store.create_user("eve").unwrap();

        let err = store.request_access(group.id, user.id).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_delete_user_cascades() {
        let (store, group) = store_with_group();
        let user = store.create_user("carol").unwrap();
        store.add_user(group.id, user.id, AccessLevel::Owner).unwrap();

        store.delete_user(user.id).unwrap();
        assert!(store.resolver().members(group.id).is_empty());
        assert!(store.get_user(user.id).is_none());
    }

    #[test]
    fn test_variables() {
        let (store, group) = store_with_group();
        let var = store.create_variable(group.id, "TOKEN", "secret", false).unwrap();

        let err = store.create_variable(group.id, "TOKEN", "again", true).unwrap_err();
        assert_eq!(err.validation_errors().unwrap().on("key"), vec!["has already been taken"]);
        assert!(store.create_variable(group.id, "bad-key", "x", false).is_err());
        assert!(store.create_variable(999, "TOKEN", "x", false).is_err());

        assert_eq!(store.list_variables(group.id).len(), 1);
        store.delete_variable(var.id).unwrap();
        assert!(store.list_variables(group.id).is_empty());
    }

    #[test]
    fn test_protect_ref_is_idempotent() {
        let (store, group) = store_with_group();
        let project = store
            .create_project(NewProject::new("API", "api").in_group(group.id))
            .unwrap();

        let rule = store.protect_ref(project.id, RefKind::Branch, "main").unwrap();
        let again = store.protect_ref(project.id, RefKind::Branch, "main").unwrap();
        assert_eq!(rule.id, again.id);
        assert_eq!(store.list_protected_refs(project.id).len(), 1);

        store.unprotect_ref(rule.id).unwrap();
        assert!(store.list_protected_refs(project.id).is_empty());
    }

    #[test]
    fn test_delete_group_removes_projects() {
        let (store, group) = store_with_group();
        let project = store
            .create_project(NewProject::new("API", "api").in_group(group.id))
            .unwrap();
        store.create_variable(group.id, "TOKEN", "secret", false).unwrap();

        store.delete_group(group.id).unwrap();
        assert!(store.get_project(project.id).is_none());
        assert!(store.list_variables(group.id).is_empty());
    }

    #[test]
    fn test_recompute_two_factor_uses_hierarchy() {
        let store = GroupStore::new();
        let parent = store
            .create_group(NewGroup::new("Parent", "parent").with_two_factor(12))
            .unwrap();
        let child = store
            .create_group(NewGroup::new("Child", "child").with_parent(parent.id))
            .unwrap();
        let user = store.create_user("dave").unwrap();

        // Membership in the child inherits the parent's enforcement
        store.add_user(child.id, user.id, AccessLevel::Developer).unwrap();

        let user = store.get_user(user.id).unwrap();
        assert!(user.require_two_factor_authentication_from_group);
        assert_eq!(user.two_factor_grace_period, 12);

        assert!(store.update_two_factor_requirement(12345).is_err());
    }

    #[test]
    fn test_leaving_subgroup_clears_two_factor() {
        let store = GroupStore::new();
        let parent = store
            .create_group(NewGroup::new("Parent", "parent").with_two_factor(12))
            .unwrap();
        let child = store
            .create_group(NewGroup::new("Child", "child").with_parent(parent.id))
            .unwrap();
        let user = store.create_user("erin").unwrap();

        store.add_user(child.id, user.id, AccessLevel::Developer).unwrap();
        assert!(store.get_user(user.id).unwrap().require_two_factor_authentication_from_group);

        store.remove_member(child.id, user.id).unwrap();
        let user = store.get_user(user.id).unwrap();
        assert!(!user.require_two_factor_authentication_from_group);
        assert_eq!(user.two_factor_grace_period, DEFAULT_TWO_FACTOR_GRACE_PERIOD);
    }

    #[test]
    fn test_withdrawn_request_keeps_two_factor() {
        let store = GroupStore::new();
        let parent = store
            .create_group(NewGroup::new("Parent", "parent").with_two_factor(12))
            .unwrap();
        let child = store
            .create_group(NewGroup::new("Child", "child").with_parent(parent.id))
            .unwrap();
        let user = store.create_user("frank").unwrap();

        store.request_access(child.id, user.id).unwrap();
        store.remove_member(child.id, user.id).unwrap();
        assert!(!store.get_user(user.id).unwrap().require_two_factor_authentication_from_group);
    }

    #[test]
    fn test_deleting_subgroup_clears_two_factor() {
        let store = GroupStore::new();
        let parent = store
            .create_group(NewGroup::new("Parent", "parent").with_two_factor(12))
            .unwrap();
        let child = store
            .create_group(NewGroup::new("Child", "child").with_parent(parent.id))
            .unwrap();
        let user = store.create_user("grace").unwrap();

        store.add_user(child.id, user.id, AccessLevel::Developer).unwrap();
        store.delete_group(child.id).unwrap();

        let user = store.get_user(user.id).unwrap();
        assert!(!user.require_two_factor_authentication_from_group);
        assert_eq!(user.two_factor_grace_period, DEFAULT_TWO_FACTOR_GRACE_PERIOD);
    }
}
