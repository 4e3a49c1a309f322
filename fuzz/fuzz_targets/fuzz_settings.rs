#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Settings and group requests arrive as YAML/JSON; parsing must never panic
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(settings) = canopy_groups::Settings::from_yaml_str(s) {
            assert!(!settings.base_url().ends_with('/'));
            let _ = settings.default_branch_protection.protects_empty_repository();
        }

        let _ = serde_json::from_str::<canopy_groups::NewGroup>(s);
        let _ = serde_json::from_str::<canopy_groups::GroupUpdate>(s);
        let _ = serde_json::from_str::<canopy_groups::HookAttributes>(s);
    }
});
