//! End-to-end tests for membership resolution over nested groups.

use canopy_groups::{
    propagate_two_factor, AccessLevel, DefaultBranchProtection, GroupError, GroupStore,
    GroupUpdate, NewGroup, NewProject, RefKind, Result, Settings, TwoFactorRecompute, UserId,
    Visibility,
};
use parking_lot::Mutex;
use std::collections::HashMap;

fn chain(store: &GroupStore) -> (u64, u64, u64) {
    let g1 = store.create_group(NewGroup::new("Acme", "acme")).unwrap();
    let g2 = store
        .create_group(NewGroup::new("Platform", "platform").with_parent(g1.id))
        .unwrap();
    let g3 = store
        .create_group(NewGroup::new("Infra", "infra").with_parent(g2.id))
        .unwrap();
    (g1.id, g2.id, g3.id)
}

// ==================== Access Level Tests ====================

#[test]
fn test_access_inherited_from_ancestor() {
    let store = GroupStore::new();
    let (g1, g2, g3) = chain(&store);
    let user = store.create_user("alice").unwrap();

    store.add_user(g1, user.id, AccessLevel::Reporter).unwrap();

    for group in [g1, g2, g3] {
        assert_eq!(
            store.effective_access_level(group, user.id),
            Some(AccessLevel::Reporter)
        );
    }
}

#[test]
fn test_nearer_membership_raises_level() {
    let store = GroupStore::new();
    let (g1, g2, g3) = chain(&store);
    let user = store.create_user("alice").unwrap();

    store.add_user(g1, user.id, AccessLevel::Guest).unwrap();
    store.add_user(g2, user.id, AccessLevel::Master).unwrap();

    let resolver = store.resolver();
    assert_eq!(resolver.effective_access_level(g1, user.id), Some(AccessLevel::Guest));
    assert_eq!(resolver.effective_access_level(g2, user.id), Some(AccessLevel::Master));
    assert_eq!(resolver.effective_access_level(g3, user.id), Some(AccessLevel::Master));
    assert!(resolver.has_access_at_least(g3, user.id, AccessLevel::Developer));
    assert!(!resolver.has_access_at_least(g1, user.id, AccessLevel::Reporter));
}

#[test]
fn test_lower_descendant_grant_does_not_reduce_access() {
    let store = GroupStore::new();
    let (g1, _, g3) = chain(&store);
    let user = store.create_user("alice").unwrap();

    store.add_user(g1, user.id, AccessLevel::Owner).unwrap();
    store.add_user(g3, user.id, AccessLevel::Guest).unwrap();

    assert_eq!(store.effective_access_level(g3, user.id), Some(AccessLevel::Owner));
}

#[test]
fn test_requests_grant_nothing() {
    let store = GroupStore::new();
    let (g1, _, g3) = chain(&store);
    let user = store.create_user("bob").unwrap();

    store.request_access(g1, user.id).unwrap();

    assert_eq!(store.effective_access_level(g1, user.id), None);
    assert_eq!(store.effective_access_level(g3, user.id), None);
}

#[test]
fn test_unknown_group_has_no_access() {
    let store = GroupStore::new();
    let user = store.create_user("bob").unwrap();
    assert_eq!(store.effective_access_level(404, user.id), None);
    assert!(!store.has_access_at_least(404, user.id, AccessLevel::Guest));
}

// ==================== Membership Listing Tests ====================

#[test]
fn test_members_and_requesters_disjoint() {
    let store = GroupStore::new();
    let (g1, _, _) = chain(&store);
    let alice = store.create_user("alice").unwrap();
    let bob = store.create_user("bob").unwrap();

    store.add_user(g1, alice.id, AccessLevel::Developer).unwrap();
    store.request_access(g1, bob.id).unwrap();

    let resolver = store.resolver();
    let members: Vec<UserId> = resolver.members(g1).iter().map(|m| m.user_id).collect();
    let requesters: Vec<UserId> = resolver.requesters(g1).iter().map(|m| m.user_id).collect();

    assert_eq!(members, vec![alice.id]);
    assert_eq!(requesters, vec![bob.id]);
}

#[test]
fn test_add_user_twice_keeps_one_row() {
    let store = GroupStore::new();
    let (g1, _, _) = chain(&store);
    let user = store.create_user("alice").unwrap();

    store.add_user(g1, user.id, AccessLevel::Guest).unwrap();
    store.add_user(g1, user.id, AccessLevel::Developer).unwrap();

    let resolver = store.resolver();
    let members = resolver.members(g1);
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].access_level, AccessLevel::Developer);
    assert_eq!(resolver.members_at(g1, AccessLevel::Developer).len(), 1);
    assert!(resolver.members_at(g1, AccessLevel::Guest).is_empty());
}

#[test]
fn test_add_users_in_bulk() {
    let store = GroupStore::new();
    let (g1, _, _) = chain(&store);
    let alice = store.create_user("alice").unwrap();
    let bob = store.create_user("bob").unwrap();

    let added = store
        .add_users(g1, &[alice.id, bob.id], AccessLevel::Guest)
        .unwrap();
    assert_eq!(added.len(), 2);
    assert_eq!(store.resolver().members_at(g1, AccessLevel::Guest).len(), 2);
}

#[test]
fn test_owners_equal_users() {
    let store = GroupStore::new();
    let (g1, _, _) = chain(&store);
    let owner = store.create_user("owner").unwrap();
    let master = store.create_user("master").unwrap();

    store.add_user(g1, owner.id, AccessLevel::Owner).unwrap();
    store.add_user(g1, master.id, AccessLevel::Master).unwrap();

    let resolver = store.resolver();
    let owners = resolver.owners(g1);
    assert_eq!(owners, resolver.users(g1));
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].username, "owner");
}

#[test]
fn test_has_owner_and_has_master_are_exact() {
    let store = GroupStore::new();
    let (g1, g2, _) = chain(&store);
    let owner = store.create_user("owner").unwrap();
    let master = store.create_user("master").unwrap();
    let developer = store.create_user("developer").unwrap();
    let requester = store.create_user("requester").unwrap();

    store.add_user(g1, owner.id, AccessLevel::Owner).unwrap();
    store.add_user(g1, master.id, AccessLevel::Master).unwrap();
    store.add_user(g1, developer.id, AccessLevel::Developer).unwrap();
    store.request_access(g1, requester.id).unwrap();

    let resolver = store.resolver();
    assert!(resolver.has_owner(g1, owner.id));
    assert!(!resolver.has_owner(g1, master.id));
    assert!(!resolver.has_owner(g1, developer.id));
    assert!(!resolver.has_owner(g1, requester.id));

    assert!(resolver.has_master(g1, master.id));
    assert!(!resolver.has_master(g1, owner.id));
    assert!(!resolver.has_master(g1, developer.id));
    assert!(!resolver.has_master(g1, requester.id));

    // Direct memberships only
    assert!(!resolver.has_owner(g2, owner.id));
}

#[test]
fn test_members_with_parents() {
    let store = GroupStore::new();
    let (g1, g2, g3) = chain(&store);
    let alice = store.create_user("alice").unwrap();
    let bob = store.create_user("bob").unwrap();

    store.add_user(g1, alice.id, AccessLevel::Owner).unwrap();
    store.add_user(g3, bob.id, AccessLevel::Developer).unwrap();
    store.add_user(g3, alice.id, AccessLevel::Guest).unwrap();

    let resolver = store.resolver();
    assert_eq!(resolver.members_with_parents(g3).len(), 3);
    assert_eq!(resolver.members_with_parents(g2).len(), 1);
    assert_eq!(
        resolver.user_ids_for_project_authorizations(g3),
        vec![alice.id, bob.id]
    );
}

// ==================== Secret Variable Tests ====================

fn project_with_variables(store: &GroupStore) -> (u64, u64) {
    let group = store.create_group(NewGroup::new("Acme", "acme")).unwrap();
    let project = store
        .create_project(NewProject::new("API", "api").in_group(group.id))
        .unwrap();
    store.set_repository_empty(project.id, false).unwrap();
    store.create_variable(group.id, "PROTECTED", "p", true).unwrap();
    store.create_variable(group.id, "UNPROTECTED", "u", false).unwrap();
    (group.id, project.id)
}

fn keys(vars: &[canopy_groups::SecretVariable]) -> Vec<&str> {
    vars.iter().map(|v| v.key.as_str()).collect()
}

#[test]
fn test_unprotected_ref_sees_unprotected_only() {
    let store = GroupStore::new();
    let (group, project) = project_with_variables(&store);

    let vars = store.secret_variables_for(group, "feature", project);
    assert_eq!(keys(&vars), vec!["UNPROTECTED"]);
}

#[test]
fn test_protected_branch_sees_all() {
    let store = GroupStore::new();
    let (group, project) = project_with_variables(&store);
    store.protect_ref(project, RefKind::Branch, "master").unwrap();

    let vars = store.secret_variables_for(group, "master", project);
    assert_eq!(keys(&vars), vec!["PROTECTED", "UNPROTECTED"]);
}

#[test]
fn test_protected_tag_sees_all() {
    let store = GroupStore::new();
    let (group, project) = project_with_variables(&store);
    store.protect_ref(project, RefKind::Tag, "v*").unwrap();

    let vars = store.secret_variables_for(group, "v1.0.0", project);
    assert_eq!(keys(&vars), vec!["PROTECTED", "UNPROTECTED"]);
}

#[test]
fn test_empty_repository_blanket_protection() {
    for (policy, protected) in [
        (DefaultBranchProtection::Full, true),
        (DefaultBranchProtection::DevCanMerge, true),
        (DefaultBranchProtection::DevCanPush, false),
        (DefaultBranchProtection::None, false),
    ] {
        let store = GroupStore::with_settings(Settings {
            default_branch_protection: policy,
            ..Settings::default()
        });
        let (group, project) = project_with_variables(&store);
        store.set_repository_empty(project, true).unwrap();

        let vars = store.secret_variables_for(group, "anything", project);
        assert_eq!(vars.len() == 2, protected, "policy {:?}", policy);
    }
}

#[test]
fn test_variables_nearest_group_first() {
    let store = GroupStore::new();
    let (g1, g2, g3) = chain(&store);
    let project = store
        .create_project(NewProject::new("API", "api").in_group(g3))
        .unwrap();

    store.set_repository_empty(project.id, false).unwrap();
    store.protect_ref(project.id, RefKind::Branch, "main").unwrap();

    store.create_variable(g1, "ROOT", "1", false).unwrap();
    store.create_variable(g1, "ROOT_P", "1p", true).unwrap();
    store.create_variable(g2, "MIDDLE_P", "2p", true).unwrap();
    store.create_variable(g2, "MIDDLE", "2", false).unwrap();
    store.create_variable(g3, "LEAF", "3", false).unwrap();
    store.create_variable(g3, "LEAF_P", "3p", true).unwrap();
    store.create_variable(g3, "LEAF_2", "4", false).unwrap();

    // Within a group, creation order wins regardless of protection
    let vars = store.secret_variables_for(g3, "main", project.id);
    assert_eq!(
        keys(&vars),
        vec!["LEAF", "LEAF_P", "LEAF_2", "MIDDLE_P", "MIDDLE", "ROOT", "ROOT_P"]
    );

    let vars = store.secret_variables_for(g3, "feature", project.id);
    assert_eq!(keys(&vars), vec!["LEAF", "LEAF_2", "MIDDLE", "ROOT"]);
}

// ==================== Two-Factor Cascade Tests ====================

struct Counting<'a> {
    store: &'a GroupStore,
    calls: Mutex<HashMap<UserId, usize>>,
}

impl TwoFactorRecompute for Counting<'_> {
    fn update_two_factor_requirement(&self, user: UserId) -> Result<()> {
        *self.calls.lock().entry(user).or_default() += 1;
        self.store.update_two_factor_requirement(user)
    }
}

fn group_with_members(store: &GroupStore) -> (u64, Vec<UserId>) {
    let group = store.create_group(NewGroup::new("Acme", "acme")).unwrap();
    let mut users = Vec::new();
    for (name, level) in [
        ("owner", AccessLevel::Owner),
        ("dev", AccessLevel::Developer),
        ("guest", AccessLevel::Guest),
    ] {
        let user = store.create_user(name).unwrap();
        store.add_user(group.id, user.id, level).unwrap();
        users.push(user.id);
    }
    let requester = store.create_user("requester").unwrap();
    store.request_access(group.id, requester.id).unwrap();
    (group.id, users)
}

#[test]
fn test_two_factor_change_recomputes_each_member_once() {
    let store = GroupStore::new();
    let (group, members) = group_with_members(&store);

    let updates = [
        GroupUpdate {
            require_two_factor_authentication: Some(true),
            ..Default::default()
        },
        GroupUpdate {
            two_factor_grace_period: Some(12),
            ..Default::default()
        },
        GroupUpdate {
            require_two_factor_authentication: Some(false),
            two_factor_grace_period: Some(24),
            ..Default::default()
        },
    ];

    for update in updates {
        let updated = store.update_group(group, update).unwrap();
        assert_eq!(updated.two_factor_users, members);

        let counting = Counting {
            store: &store,
            calls: Mutex::new(HashMap::new()),
        };
        let report = propagate_two_factor(&updated.two_factor_users, &counting);
        assert!(report.is_complete());

        let calls = counting.calls.lock();
        assert_eq!(calls.len(), members.len());
        assert!(calls.values().all(|&n| n == 1));
    }
}

#[test]
fn test_unrelated_update_recomputes_nothing() {
    let store = GroupStore::new();
    let (group, _) = group_with_members(&store);

    let updated = store
        .update_group(
            group,
            GroupUpdate {
                name: Some("Acme Corp".into()),
                visibility: Some(Visibility::Public),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(updated.two_factor_users.is_empty());
}

#[test]
fn test_two_factor_requirement_reaches_members() {
    let store = GroupStore::new();
    let (group, members) = group_with_members(&store);

    let updated = store
        .update_group(
            group,
            GroupUpdate {
                require_two_factor_authentication: Some(true),
                two_factor_grace_period: Some(6),
                ..Default::default()
            },
        )
        .unwrap();
    propagate_two_factor(&updated.two_factor_users, &store);

    for id in members {
        let user = store.get_user(id).unwrap();
        assert!(user.require_two_factor_authentication_from_group);
        assert_eq!(user.two_factor_grace_period, 6);
    }
    let requester = store.get_user_by_username("requester").unwrap();
    assert!(!requester.require_two_factor_authentication_from_group);
}

#[test]
fn test_joining_enforcing_group_requires_two_factor() {
    let store = GroupStore::new();
    let group = store
        .create_group(NewGroup::new("Secure", "secure").with_two_factor(3))
        .unwrap();
    let user = store.create_user("alice").unwrap();

    store.add_user(group.id, user.id, AccessLevel::Developer).unwrap();

    let user = store.get_user(user.id).unwrap();
    assert!(user.require_two_factor_authentication_from_group);
    assert_eq!(user.two_factor_grace_period, 3);
}

#[test]
fn test_failed_recompute_is_reported() {
    let store = GroupStore::new();
    let (_, members) = group_with_members(&store);

    let mut users = members.clone();
    users.push(9999);
    let report = propagate_two_factor(&users, &store);

    assert_eq!(report.updated, members);
    assert_eq!(report.failed_users(), vec![9999]);
    assert!(matches!(report.failed[0].1, GroupError::NotFound(_)));
}

// ==================== Path Validation Tests ====================

#[test]
fn test_reserved_paths() {
    let store = GroupStore::new();

    let err = store.create_group(NewGroup::new("Api", "api")).unwrap_err();
    assert_eq!(err.validation_errors().unwrap().on("path"), vec!["is a reserved name"]);

    let parent = store.create_group(NewGroup::new("Acme", "acme")).unwrap();
    assert!(store
        .create_group(NewGroup::new("Api", "api").with_parent(parent.id))
        .is_ok());

    let err = store
        .create_group(NewGroup::new("Tree", "tree").with_parent(parent.id))
        .unwrap_err();
    assert_eq!(err.status_code(), 422);

    assert!(store.create_group(NewGroup::new("Activity", "activity")).is_err());
    assert!(store
        .create_group(NewGroup::new("Activity", "activity").with_parent(parent.id))
        .is_err());
}

#[test]
fn test_renaming_into_reserved_path_fails() {
    let store = GroupStore::new();
    let group = store.create_group(NewGroup::new("Acme", "acme")).unwrap();

    let err = store
        .update_group(
            group.id,
            GroupUpdate {
                path: Some("admin".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.status_code(), 422);
    assert_eq!(store.get_group(group.id).unwrap().path, "acme");
}

// ==================== Search & Scope Tests ====================

#[test]
fn test_search() {
    let store = GroupStore::new();
    let group = store.create_group(NewGroup::new("Rocket Lab", "rockets")).unwrap();
    store.create_group(NewGroup::new("Other", "other")).unwrap();

    for query in ["Rocket Lab", "rocket", "ROCKETS", "kets", "ket l"] {
        let found = store.resolver().search(query);
        assert_eq!(found.len(), 1, "query {:?}", query);
        assert_eq!(found[0].id, group.id);
    }
    assert!(store.resolver().search("nothing").is_empty());
}

#[test]
fn test_visibility_scopes() {
    let store = GroupStore::new();
    let public = store
        .create_group(NewGroup::new("Public", "public-group").with_visibility(Visibility::Public))
        .unwrap();
    let internal = store
        .create_group(NewGroup::new("Internal", "internal").with_visibility(Visibility::Internal))
        .unwrap();
    let private = store.create_group(NewGroup::new("Private", "private")).unwrap();

    let ids = |groups: Vec<canopy_groups::Group>| {
        groups.into_iter().map(|g| g.id).collect::<Vec<_>>()
    };
    let resolver = store.resolver();
    assert_eq!(ids(resolver.public_only()), vec![public.id]);
    assert_eq!(ids(resolver.public_and_internal_only()), vec![public.id, internal.id]);
    assert_eq!(ids(resolver.non_public_only()), vec![internal.id, private.id]);
}

#[test]
fn test_full_path_and_web_url() {
    let store = GroupStore::with_settings(Settings {
        host: "https://code.example.com/".into(),
        ..Settings::default()
    });
    let (_, _, g3) = chain(&store);

    let resolver = store.resolver();
    assert_eq!(resolver.full_path(g3).as_deref(), Some("acme/platform/infra"));
    assert_eq!(resolver.full_name(g3).as_deref(), Some("Acme / Platform / Infra"));
    assert_eq!(
        resolver.web_url(g3).as_deref(),
        Some("https://code.example.com/groups/acme/platform/infra")
    );
    assert_eq!(
        resolver.ancestors(g3).iter().map(|g| g.path.as_str()).collect::<Vec<_>>(),
        vec!["infra", "platform", "acme"]
    );
}
