//! Fuzz target for group path validation.
//!
//! Tests that path checks handle arbitrary input without panicking and
//! that every accepted path is a well-formed URL segment.

#![no_main]

use canopy_groups::validation::{self, PathRejection};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let lossy = String::from_utf8_lossy(data);

    for top_level in [true, false] {
        match validation::check_group_path(&lossy, top_level) {
            Ok(()) => {
                assert!(validation::PATH_REGEX.is_match(&lossy));
                assert!(!lossy.starts_with('-'));
                assert!(!lossy.contains('/'));
            }
            Err(PathRejection::Blank) => assert!(lossy.trim().is_empty()),
            Err(rejection) => assert!(!rejection.to_string().is_empty()),
        }
    }

    // Group routes are reserved at every level
    if validation::GROUP_ROUTES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(&lossy))
    {
        assert!(validation::check_group_path(&lossy, true).is_err());
        assert!(validation::check_group_path(&lossy, false).is_err());
    }

    let _ = validation::is_image_file(&lossy);
    let _ = validation::check_variable_key(&lossy);
    let _ = validation::check_hook_url(&lossy);
});
