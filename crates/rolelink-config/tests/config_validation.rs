//! Config loading and validation tests for rolelink-config.
// crates/rolelink-config/tests/config_validation.rs
// =============================================================================
// Module: Config Loading and Validation Tests
// Description: Validate defaults, file limits, and fail-closed validation.
// Purpose: Ensure invalid role tables and guild lists never load.
// Dependencies: rolelink-config, rolelink-core, tempfile, toml
// =============================================================================

use std::time::Duration;

use rolelink_config::CacheBackendKind;
use rolelink_config::ConfigError;
use rolelink_config::MAX_CONFIG_FILE_SIZE;
use rolelink_config::RoleLinkConfig;
use rolelink_core::CommunityId;
use rolelink_core::RoleId;
use rolelink_core::RoleName;
use rolelink_core::RuleName;

mod common;

type TestResult = Result<(), String>;

/// Asserts a validation failure whose message contains `needle`.
fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

/// Parses and validates a TOML string.
fn validated(toml_str: &str) -> Result<RoleLinkConfig, ConfigError> {
    let mut config =
        common::config_from_toml(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// An empty file yields a valid config with documented defaults.
#[test]
fn default_config_validates() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.cache.backend != CacheBackendKind::Memory {
        return Err("cache.backend should default to memory".to_string());
    }
    if config.cache.key_prefix != "rl_" {
        return Err("cache.key_prefix should default to rl_".to_string());
    }
    if config.sync.max_parallelism != 16 || config.sync.rule_timeout_ms.is_some() {
        return Err("sync defaults changed".to_string());
    }
    if config.sync.remove_unwarranted_roles || !config.sync.notify_on_failure {
        return Err("removal should be opt-in and notices opt-out".to_string());
    }
    if config.logging.filter != "info" {
        return Err("logging.filter should default to info".to_string());
    }
    Ok(())
}

/// The sample file builds the expected core values.
#[test]
fn sample_config_builds_core_values() -> TestResult {
    let config = validated(common::SAMPLE_TOML).map_err(|err| err.to_string())?;

    let declarations = config.role_declarations();
    if declarations.rule_for(&RoleName::new("member")) != Some(&RuleName::new("RoleA")) {
        return Err("member should be determined by RoleA".to_string());
    }
    if declarations.len() != 2 {
        return Err(format!("expected 2 declarations, got {}", declarations.len()));
    }

    let guilds = config.guild_configs();
    let first = guilds.first().ok_or("missing first guild")?;
    if first.community_id != CommunityId::new("1000") || first.label() != "Guild One (1000)" {
        return Err(format!("unexpected first guild {}", first.label()));
    }
    if first.role_mapping.get(&RoleName::new("_known")) != Some(&RoleId::new("110")) {
        return Err("standard role mapping lost".to_string());
    }
    if !first.is_sticky(&RoleId::new("999")) {
        return Err("sticky role lost".to_string());
    }

    let manager = config.manager_config();
    if manager.max_parallelism != 8
        || manager.rule_timeout != Some(Duration::from_secs(10))
        || !manager.remove_unwarranted_roles
    {
        return Err("manager config does not mirror [sync]".to_string());
    }
    if config.role_configuration().guilds.len() != 2 {
        return Err("role configuration should hold both guilds".to_string());
    }
    Ok(())
}

// ============================================================================
// SECTION: Roles and Guilds
// ============================================================================

/// Duplicate role names are rejected.
#[test]
fn duplicate_role_names_rejected() -> TestResult {
    let toml_str = r#"
[[roles]]
name = "member"
rule = "RoleA"

[[roles]]
name = "member"
rule = "RoleB"
"#;
    assert_invalid(validated(toml_str), "duplicate role name: member")
}

/// Standard role names cannot be declared.
#[test]
fn reserved_role_names_rejected() -> TestResult {
    for name in ["_known", "_identified"] {
        let toml_str = format!("[[roles]]\nname = \"{name}\"\nrule = \"RoleA\"\n");
        assert_invalid(validated(&toml_str), "reserved for a standard role")?;
    }
    Ok(())
}

/// Blank role names and blank rules are rejected.
#[test]
fn blank_role_fields_rejected() -> TestResult {
    assert_invalid(validated("[[roles]]\nname = \" \"\nrule = \"RoleA\"\n"), "non-empty")?;
    assert_invalid(validated("[[roles]]\nname = \"member\"\nrule = \"\"\n"), "must name a rule")
}

/// Duplicate guild ids are rejected after trimming.
#[test]
fn duplicate_guild_ids_rejected() -> TestResult {
    let toml_str = r#"
[[guilds]]
id = "1000"

[[guilds]]
id = " 1000 "
"#;
    assert_invalid(validated(toml_str), "duplicate guild id: 1000")
}

/// Empty guild ids and empty platform role ids are rejected.
#[test]
fn blank_guild_fields_rejected() -> TestResult {
    assert_invalid(validated("[[guilds]]\nid = \"\"\n"), "guilds.id must be non-empty")?;
    assert_invalid(
        validated("[[guilds]]\nid = \"1\"\n[guilds.roles]\nmember = \"\"\n"),
        "empty role id",
    )?;
    assert_invalid(
        validated("[[guilds]]\nid = \"1\"\nsticky_roles = [\"\"]\n"),
        "empty sticky role id",
    )
}

// ============================================================================
// SECTION: Sync, Cache, Logging
// ============================================================================

/// Parallelism outside 1..=256 is rejected.
#[test]
fn parallelism_bounds_enforced() -> TestResult {
    assert_invalid(validated("[sync]\nmax_parallelism = 0\n"), "max_parallelism")?;
    assert_invalid(validated("[sync]\nmax_parallelism = 257\n"), "max_parallelism")?;
    validated("[sync]\nmax_parallelism = 256\n").map_err(|err| err.to_string())?;
    Ok(())
}

/// A zero rule timeout is rejected.
#[test]
fn zero_rule_timeout_rejected() -> TestResult {
    assert_invalid(validated("[sync]\nrule_timeout_ms = 0\n"), "rule_timeout_ms")
}

/// The sqlite backend requires a path.
#[test]
fn sqlite_backend_requires_path() -> TestResult {
    assert_invalid(validated("[cache]\nbackend = \"sqlite\"\n"), "requires cache.sqlite_path")
}

/// Unknown backends fail to parse.
#[test]
fn unknown_backend_fails_parse() -> TestResult {
    assert_invalid(validated("[cache]\nbackend = \"redis\"\n"), "config parse error")
}

/// Whitespace in the key prefix is rejected.
#[test]
fn key_prefix_whitespace_rejected() -> TestResult {
    assert_invalid(validated("[cache]\nkey_prefix = \"rl \"\n"), "whitespace")
}

/// Malformed log filters are rejected.
#[test]
fn malformed_log_filter_rejected() -> TestResult {
    assert_invalid(validated("[logging]\nfilter = \"rolelink_core=loudest\"\n"), "logging.filter")
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loading from an explicit path parses and validates.
#[test]
fn load_reads_explicit_path() -> TestResult {
    let (_dir, path) =
        common::write_config(common::SAMPLE_TOML.as_bytes()).map_err(|err| err.to_string())?;
    let config = RoleLinkConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.guilds.len() != 2 || config.roles.len() != 2 {
        return Err("loaded config lost entries".to_string());
    }
    Ok(())
}

/// Loading validates as well as parses.
#[test]
fn load_runs_validation() -> TestResult {
    let (_dir, path) =
        common::write_config(b"[sync]\nmax_parallelism = 0\n").map_err(|err| err.to_string())?;
    assert_invalid(RoleLinkConfig::load(Some(&path)), "max_parallelism")
}

/// Missing files surface as I/O errors.
#[test]
fn load_missing_file_is_io_error() -> TestResult {
    let (dir, _path) = common::write_config(b"").map_err(|err| err.to_string())?;
    let missing = dir.path().join("absent.toml");
    assert_invalid(RoleLinkConfig::load(Some(&missing)), "config io error")
}

/// Oversized files are rejected before parsing.
#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut contents = b"# padding\n".to_vec();
    contents.resize(MAX_CONFIG_FILE_SIZE + 1, b' ');
    let (_dir, path) = common::write_config(&contents).map_err(|err| err.to_string())?;
    assert_invalid(RoleLinkConfig::load(Some(&path)), "exceeds size limit")
}

/// Non-UTF-8 files are rejected.
#[test]
fn load_rejects_non_utf8() -> TestResult {
    let (_dir, path) =
        common::write_config(&[0xff, 0xfe, 0x00, 0x41]).map_err(|err| err.to_string())?;
    assert_invalid(RoleLinkConfig::load(Some(&path)), "must be utf-8")
}

/// Overlong path components are rejected.
#[test]
fn load_rejects_long_path_component() -> TestResult {
    let long = "a".repeat(300);
    assert_invalid(RoleLinkConfig::load(Some(std::path::Path::new(&long))), "too long")
}
