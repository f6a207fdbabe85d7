//! Fuzz test for cache TTL settings
//!
//! Any string read from the environment must either parse into a valid,
//! non-zero TTL or be rejected with a config error naming the variable.
//!
//! Run with: cargo +nightly fuzz run ttl_setting_fuzz -- -max_total_time=60

#![no_main]

use gazetteer_core::{CacheConfig, ConfigError};
use libfuzzer_sys::fuzz_target;

const VAR: &str = "GAZETTEER_CACHE_TTL_SECS";

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    match CacheConfig::from_ttl_setting(VAR, Some(raw)) {
        Ok(config) => {
            assert!(config.validate().is_ok(), "Accepted an invalid TTL: {:?}", raw);
            if raw.trim().is_empty() {
                assert_eq!(config.ttl, None);
            }
        }
        Err(ConfigError::InvalidValue { field, .. }) => {
            assert_eq!(field, VAR, "Error must name the variable");
        }
    }
});
