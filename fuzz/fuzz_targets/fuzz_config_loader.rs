#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validate must reject bad input with errors, never panic.
    if let Ok(cfg) = rgams_config::load_toml(data) {
        let _ = cfg.validate();
    }
});
