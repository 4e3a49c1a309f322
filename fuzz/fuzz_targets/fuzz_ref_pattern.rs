//! Fuzz target for protected ref patterns.

#![no_main]

use arbitrary::Arbitrary;
use canopy_groups::{ProtectedRef, RefKind};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    pattern: String,
    ref_name: String,
    tag: bool,
}

fuzz_target!(|input: Input| {
    let kind = if input.tag { RefKind::Tag } else { RefKind::Branch };
    let rule = ProtectedRef::new(1, 1, kind, input.pattern.clone());

    let matched = rule.matches(&input.ref_name);

    // Exact names only match themselves
    if !rule.is_wildcard() {
        assert_eq!(matched, input.pattern == input.ref_name);
    }

    // A lone wildcard matches everything
    if input.pattern == "*" {
        assert!(matched);
    }

    // A pattern always matches its own literal text
    assert!(rule.matches(&input.pattern));
});
