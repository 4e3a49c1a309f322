//! Fuzz target for membership operations.
//!
//! Applies an arbitrary sequence of operations to a small hierarchy and
//! checks the resolution invariants after each one.

#![no_main]

use arbitrary::Arbitrary;
use canopy_groups::{AccessLevel, GroupStore, NewGroup};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Add { group: u8, user: u8, level: u8 },
    Request { group: u8, user: u8 },
    Remove { group: u8, user: u8 },
}

fuzz_target!(|ops: Vec<Op>| {
    let store = GroupStore::new();
    let root = store.create_group(NewGroup::new("Root", "root")).unwrap();
    let child = store
        .create_group(NewGroup::new("Child", "child").with_parent(root.id))
        .unwrap();
    let leaf = store
        .create_group(NewGroup::new("Leaf", "leaf").with_parent(child.id))
        .unwrap();
    let groups = [root.id, child.id, leaf.id];
    let users: Vec<u64> = (0..3)
        .map(|i| store.create_user(format!("user{i}")).unwrap().id)
        .collect();

    for op in ops.into_iter().take(64) {
        let _ = match op {
            Op::Add { group, user, level } => store
                .add_user(
                    groups[group as usize % 3],
                    users[user as usize % 3],
                    AccessLevel::ALL[level as usize % 5],
                )
                .map(|_| ()),
            Op::Request { group, user } => store
                .request_access(groups[group as usize % 3], users[user as usize % 3])
                .map(|_| ()),
            Op::Remove { group, user } => store
                .remove_member(groups[group as usize % 3], users[user as usize % 3])
                .map(|_| ()),
        };

        let resolver = store.resolver();
        for &user in &users {
            let levels: Vec<_> = groups
                .iter()
                .map(|&g| resolver.effective_access_level(g, user))
                .collect();
            assert!(levels.windows(2).all(|w| w[0] <= w[1]));
        }
        for &group in &groups {
            let members = resolver.members(group);
            let requesters = resolver.requesters(group);
            assert!(members
                .iter()
                .all(|m| requesters.iter().all(|r| r.user_id != m.user_id)));
            assert_eq!(resolver.owners(group), resolver.users(group));
        }
    }
});
