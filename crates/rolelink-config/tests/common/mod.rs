// crates/rolelink-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for rolelink-config.
// Dependencies: rolelink-config, tempfile, toml
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::path::PathBuf;

use rolelink_config::RoleLinkConfig;
use tempfile::TempDir;

/// Realistic configuration with two guilds and two declared roles.
pub const SAMPLE_TOML: &str = r#"
[cache]
backend = "memory"
key_prefix = "rl_"

[sync]
max_parallelism = 8
rule_timeout_ms = 10000
remove_unwarranted_roles = true

[logging]
filter = "rolelink_core=debug,info"

[[roles]]
name = "member"
display_name = "Member"
rule = "RoleA"

[[roles]]
name = "verified"
rule = "RoleB"

[[guilds]]
id = "1000"
name = "Guild One"
sticky_roles = ["999"]
[guilds.roles]
member = "111"
_known = "110"

[[guilds]]
id = "2000"
[guilds.roles]
verified = "222"
"#;

/// Parses a TOML string into a `RoleLinkConfig` without validating.
pub fn config_from_toml(toml_str: &str) -> Result<RoleLinkConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<RoleLinkConfig, toml::de::Error> {
    config_from_toml("")
}

/// Writes contents to `rolelink.toml` inside a fresh temporary directory.
pub fn write_config(contents: &[u8]) -> std::io::Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let path = dir.path().join("rolelink.toml");
    std::fs::write(&path, contents)?;
    Ok((dir, path))
}
