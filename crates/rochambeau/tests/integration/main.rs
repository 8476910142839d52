//! Integration tests for rochambeau
//!
//! These tests require the isolate binary to be installed and accessible.
//! Run with: cargo test -p rochambeau --features integration-tests
//!
//! Tests that require root are marked `#[ignore]`. To include them:
//!    cargo test -p rochambeau --features integration-tests -- --include-ignored

#![cfg(feature = "integration-tests")]

use rochambeau::config::Config;

mod evaluation;
mod sandbox_lifecycle;

/// Create a test config with cgroup support if available, falling back to non-cgroup mode.
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    if config.cgroup {
        match rochambeau::prepare_cgroup(&config.cg_root) {
            Ok(true) => {}              // cgroups ready
            _ => config.cgroup = false, // not available, fall back
        }
    }
    config
}
