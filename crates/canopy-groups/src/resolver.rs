//! Membership resolution over the group tree.
//!
//! Every query here reads one [`State`] snapshot. [`Resolver`] holds the
//! store's read guard for its whole lifetime, so a sequence of queries on
//! the same resolver never observes a concurrent write halfway through.

use crate::{
    access::AccessLevel,
    group::Group,
    membership::Membership,
    protected_ref::ProtectedRef,
    settings::Settings,
    store::State,
    variable::SecretVariable,
};
use canopy_types::{GroupId, ProjectId, User, UserId, Visibility};
use parking_lot::RwLockReadGuard;
use std::collections::{HashSet, VecDeque};

impl State {
    /// IDs of the group and its ancestors, nearest first.
    ///
    /// Unknown IDs yield an empty chain. A visited set stops the walk if a
    /// corrupted parent link ever forms a loop.
    pub(crate) fn ancestor_chain(&self, group: GroupId) -> Vec<GroupId> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(group);

        while let Some(id) = current {
            let Some(g) = self.groups.get(&id) else { break };
            if !visited.insert(id) {
                tracing::warn!(group = id, "cycle in group ancestry");
                break;
            }
            chain.push(id);
            current = g.parent_id;
        }
        chain
    }

    /// IDs of the group and all of its descendants, breadth first.
    pub(crate) fn descendant_ids(&self, group: GroupId) -> Vec<GroupId> {
        if !self.groups.contains_key(&group) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([group]);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            out.push(id);
            let mut children: Vec<GroupId> = self
                .groups
                .values()
                .filter(|g| g.parent_id == Some(id))
                .map(|g| g.id)
                .collect();
            children.sort_unstable();
            queue.extend(children);
        }
        out
    }

    pub(crate) fn full_path(&self, group: GroupId) -> Option<String> {
        let chain = self.ancestor_chain(group);
        if chain.is_empty() {
            return None;
        }
        let segments: Vec<&str> = chain
            .iter()
            .rev()
            .filter_map(|id| self.groups.get(id).map(|g| g.path.as_str()))
            .collect();
        Some(segments.join("/"))
    }

    pub(crate) fn full_name(&self, group: GroupId) -> Option<String> {
        let chain = self.ancestor_chain(group);
        if chain.is_empty() {
            return None;
        }
        let segments: Vec<&str> = chain
            .iter()
            .rev()
            .filter_map(|id| self.groups.get(id).map(|g| g.name.as_str()))
            .collect();
        Some(segments.join(" / "))
    }

    fn direct_level(&self, group: GroupId, user: UserId) -> Option<AccessLevel> {
        self.memberships
            .get(&(group, user))
            .and_then(Membership::granted_level)
    }

    /// Highest active level the user holds on the group or any ancestor.
    pub(crate) fn effective_access_level(
        &self,
        group: GroupId,
        user: UserId,
    ) -> Option<AccessLevel> {
        self.ancestor_chain(group)
            .into_iter()
            .filter_map(|id| self.direct_level(id, user))
            .max()
    }

    fn memberships_where(
        &self,
        group: GroupId,
        pred: impl Fn(&Membership) -> bool,
    ) -> Vec<Membership> {
        let mut out: Vec<Membership> = self
            .memberships
            .values()
            .filter(|m| m.group_id == group && pred(m))
            .cloned()
            .collect();
        out.sort_by_key(|m| m.id);
        out
    }

    pub(crate) fn members(&self, group: GroupId) -> Vec<Membership> {
        self.memberships_where(group, Membership::is_active)
    }

    pub(crate) fn requesters(&self, group: GroupId) -> Vec<Membership> {
        self.memberships_where(group, Membership::is_request)
    }

    pub(crate) fn owners(&self, group: GroupId) -> Vec<User> {
        self.members(group)
            .into_iter()
            .filter(|m| m.access_level == AccessLevel::Owner)
            .filter_map(|m| self.users.get(&m.user_id).cloned())
            .collect()
    }

    pub(crate) fn members_with_parents(&self, group: GroupId) -> Vec<Membership> {
        self.ancestor_chain(group)
            .into_iter()
            .flat_map(|id| self.members(id))
            .collect()
    }

    /// Level on a project: direct project membership or the owning group's
    /// effective level, whichever is higher.
    pub(crate) fn project_access_level(
        &self,
        project: ProjectId,
        user: UserId,
    ) -> Option<AccessLevel> {
        let project = self.projects.get(&project)?;
        let direct = self
            .project_members
            .get(&(project.id, user))
            .map(|m| m.access_level);
        let inherited = project
            .group_id
            .and_then(|group| self.effective_access_level(group, user));
        direct.max(inherited)
    }

    pub(crate) fn protected_refs_for(&self, project: ProjectId) -> Vec<ProtectedRef> {
        let mut rules: Vec<ProtectedRef> = self
            .protected_refs
            .values()
            .filter(|r| r.project_id == project)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.id);
        rules
    }

    /// Whether a ref is protected for a project: by an explicit branch or tag
    /// rule, or by blanket default-branch protection while the repository is empty.
    pub(crate) fn is_ref_protected(
        &self,
        settings: &Settings,
        project: ProjectId,
        ref_name: &str,
    ) -> bool {
        let Some(project) = self.projects.get(&project) else {
            return false;
        };
        let by_rule = self
            .protected_refs
            .values()
            .any(|r| r.project_id == project.id && r.matches(ref_name));
        if by_rule {
            return true;
        }
        project.empty_repo && settings.default_branch_protection.protects_empty_repository()
    }

    /// Variables of the group and its ancestors visible on `ref_name`,
    /// nearest group first, each group's variables in creation order.
    pub(crate) fn secret_variables_for(
        &self,
        settings: &Settings,
        group: GroupId,
        ref_name: &str,
        project: ProjectId,
    ) -> Vec<SecretVariable> {
        let protected = self.is_ref_protected(settings, project, ref_name);
        let mut out = Vec::new();

        for id in self.ancestor_chain(group) {
            let mut own: Vec<&SecretVariable> = self
                .variables
                .values()
                .filter(|v| v.group_id == id && v.visible_on(protected))
                .collect();
            own.sort_by_key(|v| v.id);
            out.extend(own.into_iter().cloned());
        }

        tracing::debug!(
            group = group,
            project = project,
            ref_name = %ref_name,
            protected = protected,
            count = out.len(),
            "resolved secret variables"
        );
        out
    }

    /// Grace periods of every enforcing group in the user's hierarchy:
    /// the groups they belong to, plus those groups' ancestors and descendants.
    pub(crate) fn two_factor_periods_for(&self, user: UserId) -> Vec<i64> {
        let mut expanded = HashSet::new();
        for m in self.memberships.values() {
            if m.user_id != user || !m.is_active() {
                continue;
            }
            expanded.extend(self.ancestor_chain(m.group_id));
            expanded.extend(self.descendant_ids(m.group_id));
        }

        expanded
            .into_iter()
            .filter_map(|id| self.groups.get(&id))
            .filter(|g| g.require_two_factor_authentication)
            .map(|g| g.two_factor_grace_period)
            .collect()
    }

    pub(crate) fn groups_where(&self, pred: impl Fn(&Group) -> bool) -> Vec<Group> {
        let mut out: Vec<Group> = self.groups.values().filter(|g| pred(g)).cloned().collect();
        out.sort_by_key(|g| g.id);
        out
    }
}

/// Read-only view of the store for membership resolution.
///
/// Obtained from [`GroupStore::resolver`](crate::GroupStore::resolver).
/// Holding a resolver blocks writers, so keep it short-lived.
pub struct Resolver<'a> {
    state: RwLockReadGuard<'a, State>,
    settings: &'a Settings,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(state: RwLockReadGuard<'a, State>, settings: &'a Settings) -> Self {
        Self { state, settings }
    }

    /// Get a group by ID.
    pub fn group(&self, group: GroupId) -> Option<Group> {
        self.state.groups.get(&group).cloned()
    }

    /// The group and its ancestors, nearest first.
    pub fn ancestors(&self, group: GroupId) -> Vec<Group> {
        self.state
            .ancestor_chain(group)
            .into_iter()
            .filter_map(|id| self.state.groups.get(&id).cloned())
            .collect()
    }

    /// Subgroups at any depth, excluding the group itself.
    pub fn descendants(&self, group: GroupId) -> Vec<Group> {
        self.state
            .descendant_ids(group)
            .into_iter()
            .skip(1)
            .filter_map(|id| self.state.groups.get(&id).cloned())
            .collect()
    }

    /// Ancestor paths joined with `/`, e.g. `acme/platform/infra`.
    pub fn full_path(&self, group: GroupId) -> Option<String> {
        self.state.full_path(group)
    }

    /// Ancestor names joined with ` / `.
    pub fn full_name(&self, group: GroupId) -> Option<String> {
        self.state.full_name(group)
    }

    /// Canonical URL of the group page.
    pub fn web_url(&self, group: GroupId) -> Option<String> {
        let path = self.state.full_path(group)?;
        Some(format!("{}/groups/{}", self.settings.base_url(), path))
    }

    /// Highest active level the user holds on the group or any ancestor.
    pub fn effective_access_level(&self, group: GroupId, user: UserId) -> Option<AccessLevel> {
        self.state.effective_access_level(group, user)
    }

    /// Whether the effective level is at least `level`.
    pub fn has_access_at_least(&self, group: GroupId, user: UserId, level: AccessLevel) -> bool {
        self.effective_access_level(group, user)
            .map(|l| l.has(level))
            .unwrap_or(false)
    }

    /// Whether the user is a direct Owner of the group.
    pub fn has_owner(&self, group: GroupId, user: UserId) -> bool {
        self.state.direct_level(group, user) == Some(AccessLevel::Owner)
    }

    /// Whether the user is a direct Master of the group. Owners are not Masters.
    pub fn has_master(&self, group: GroupId, user: UserId) -> bool {
        self.state.direct_level(group, user) == Some(AccessLevel::Master)
    }

    /// Active direct memberships.
    pub fn members(&self, group: GroupId) -> Vec<Membership> {
        self.state.members(group)
    }

    /// Active direct memberships at exactly `level`.
    pub fn members_at(&self, group: GroupId, level: AccessLevel) -> Vec<Membership> {
        self.state
            .members(group)
            .into_iter()
            .filter(|m| m.access_level == level)
            .collect()
    }

    /// Pending access requests.
    pub fn requesters(&self, group: GroupId) -> Vec<Membership> {
        self.state.requesters(group)
    }

    /// Users holding a direct Owner membership.
    pub fn owners(&self, group: GroupId) -> Vec<User> {
        self.state.owners(group)
    }

    /// A group's users are its owners.
    pub fn users(&self, group: GroupId) -> Vec<User> {
        self.owners(group)
    }

    /// Active memberships of the group and all its ancestors.
    pub fn members_with_parents(&self, group: GroupId) -> Vec<Membership> {
        self.state.members_with_parents(group)
    }

    /// Users whose project authorizations depend on this group.
    pub fn user_ids_for_project_authorizations(&self, group: GroupId) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self
            .state
            .members_with_parents(group)
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Effective level on a project.
    pub fn project_access_level(&self, project: ProjectId, user: UserId) -> Option<AccessLevel> {
        self.state.project_access_level(project, user)
    }

    /// Whether a ref is protected for a project.
    pub fn is_ref_protected(&self, project: ProjectId, ref_name: &str) -> bool {
        self.state.is_ref_protected(self.settings, project, ref_name)
    }

    /// Secret variables visible to a job of `project` on `ref_name`, nearest group first.
    pub fn secret_variables_for(
        &self,
        group: GroupId,
        ref_name: &str,
        project: ProjectId,
    ) -> Vec<SecretVariable> {
        self.state
            .secret_variables_for(self.settings, group, ref_name, project)
    }

    /// Groups whose name or path contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<Group> {
        let needle = query.to_lowercase();
        self.state.groups_where(|g| {
            g.name.to_lowercase().contains(&needle) || g.path.to_lowercase().contains(&needle)
        })
    }

    /// Groups where the user holds an active direct membership.
    pub fn visible_to_user(&self, user: UserId) -> Vec<Group> {
        self.state
            .groups_where(|g| self.state.direct_level(g.id, user).is_some())
    }

    /// Public groups.
    pub fn public_only(&self) -> Vec<Group> {
        self.state.groups_where(|g| g.visibility == Visibility::Public)
    }

    /// Public and internal groups.
    pub fn public_and_internal_only(&self) -> Vec<Group> {
        self.state.groups_where(|g| g.visibility >= Visibility::Internal)
    }

    /// Internal and private groups.
    pub fn non_public_only(&self) -> Vec<Group> {
        self.state.groups_where(|g| g.visibility != Visibility::Public)
    }

    /// Whether LFS is enabled for the group.
    pub fn lfs_enabled(&self, group: GroupId) -> bool {
        self.state
            .groups
            .get(&group)
            .map(|g| g.lfs_enabled(self.settings))
            .unwrap_or(false)
    }
}
