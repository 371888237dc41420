// crates/rolelink-config/src/config.rs
// ============================================================================
// Module: RoleLink Configuration
// Description: Configuration loading and validation for RoleLink.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: rolelink-core, rolelink-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: a role table or guild list
//! that does not validate never reaches the role manager.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rolelink_core::GuildRoleConfig;
use rolelink_core::InMemoryCacheBackend;
use rolelink_core::RoleConfiguration;
use rolelink_core::RoleDeclaration;
use rolelink_core::RoleDeclarations;
use rolelink_core::RoleManagerConfig;
use rolelink_core::RuleCache;
use rolelink_core::StandardRole;
use rolelink_store_sqlite::SqliteCacheBackend;
use rolelink_store_sqlite::SqliteCacheConfig;
use rolelink_store_sqlite::SqliteJournalMode;
use serde::Deserialize;
use thiserror::Error;

use crate::logging::LoggingConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "rolelink.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "ROLELINK_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for `sync.max_parallelism`.
pub const MAX_PARALLELISM: usize = 256;
/// Default for `sync.max_parallelism`.
const DEFAULT_MAX_PARALLELISM: usize = 16;
/// Default cache key prefix.
const DEFAULT_KEY_PREFIX: &str = "rl_";
/// Maximum length of the cache key prefix.
const MAX_KEY_PREFIX_LENGTH: usize = 64;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// RoleLink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleLinkConfig {
    /// Rule result cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Resolution and reconciliation behavior.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Declared abstract roles.
    #[serde(default)]
    pub roles: Vec<RoleDeclaration>,
    /// Monitored communities.
    #[serde(default)]
    pub guilds: Vec<GuildConfig>,
}

impl RoleLinkConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is the explicit argument, then [`CONFIG_ENV_VAR`], then
    /// `rolelink.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.sync.validate()?;
        self.logging.validate()?;
        validate_roles(&self.roles)?;
        let mut seen = BTreeSet::new();
        for guild in &mut self.guilds {
            guild.validate()?;
            if !seen.insert(guild.id.clone()) {
                return Err(ConfigError::Invalid(format!("duplicate guild id: {}", guild.id)));
            }
        }
        Ok(())
    }

    /// Returns the global role declaration table.
    #[must_use]
    pub fn role_declarations(&self) -> RoleDeclarations {
        self.roles.iter().cloned().collect()
    }

    /// Returns one core role configuration per monitored guild.
    #[must_use]
    pub fn guild_configs(&self) -> Vec<GuildRoleConfig> {
        self.guilds.iter().map(GuildConfig::to_role_config).collect()
    }

    /// Returns the combined role configuration consumed by the role manager.
    #[must_use]
    pub fn role_configuration(&self) -> RoleConfiguration {
        RoleConfiguration::new(self.role_declarations(), self.guild_configs())
    }

    /// Returns the role manager tuning derived from `[sync]`.
    #[must_use]
    pub fn manager_config(&self) -> RoleManagerConfig {
        RoleManagerConfig {
            max_parallelism: self.sync.max_parallelism,
            rule_timeout: self.sync.rule_timeout_ms.map(Duration::from_millis),
            remove_unwarranted_roles: self.sync.remove_unwarranted_roles,
            notify_on_failure: self.sync.notify_on_failure,
        }
    }

    /// Builds the rule cache selected by `[cache]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the `SQLite` backend cannot be opened.
    pub fn build_cache(&self) -> Result<RuleCache, ConfigError> {
        match self.cache.backend {
            CacheBackendKind::None => Ok(RuleCache::disabled()),
            CacheBackendKind::Memory => Ok(RuleCache::new(
                Arc::new(InMemoryCacheBackend::new()),
                self.cache.key_prefix.clone(),
            )),
            CacheBackendKind::Sqlite => {
                let path = self.cache.sqlite_path.clone().ok_or_else(|| {
                    ConfigError::Invalid("cache.sqlite_path required for sqlite".to_string())
                })?;
                let config = SqliteCacheConfig {
                    path,
                    busy_timeout_ms: self.cache.sqlite_busy_timeout_ms,
                    journal_mode: self.cache.sqlite_journal_mode,
                };
                let backend = SqliteCacheBackend::open(&config)
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(RuleCache::new(Arc::new(backend), self.cache.key_prefix.clone()))
            }
        }
    }
}

// ============================================================================
// SECTION: Cache Configuration
// ============================================================================

/// Cache backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    /// Caching disabled; every rule runs on every resolution.
    None,
    /// Process-local in-memory cache.
    #[default]
    Memory,
    /// Persistent `SQLite` cache.
    Sqlite,
}

/// Rule result cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: CacheBackendKind,
    /// Prefix applied to every cache key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Database path for the `SQLite` backend.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    /// `SQLite` busy timeout in milliseconds.
    #[serde(default = "default_sqlite_busy_timeout_ms")]
    pub sqlite_busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub sqlite_journal_mode: SqliteJournalMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            key_prefix: default_key_prefix(),
            sqlite_path: None,
            sqlite_busy_timeout_ms: default_sqlite_busy_timeout_ms(),
            sqlite_journal_mode: SqliteJournalMode::default(),
        }
    }
}

impl CacheConfig {
    /// Validates cache settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.len() > MAX_KEY_PREFIX_LENGTH {
            return Err(ConfigError::Invalid("cache.key_prefix exceeds max length".to_string()));
        }
        if self.key_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "cache.key_prefix must not contain whitespace".to_string(),
            ));
        }
        match (&self.backend, &self.sqlite_path) {
            (CacheBackendKind::Sqlite, None) => Err(ConfigError::Invalid(
                "cache.backend=sqlite requires cache.sqlite_path".to_string(),
            )),
            (_, Some(path)) => validate_path_string("cache.sqlite_path", &path.to_string_lossy()),
            (_, None) => Ok(()),
        }
    }
}

/// Default cache key prefix.
fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

/// Default `SQLite` busy timeout.
const fn default_sqlite_busy_timeout_ms() -> u64 {
    5_000
}

// ============================================================================
// SECTION: Sync Configuration
// ============================================================================

/// Resolution and reconciliation behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Maximum concurrently running rule or community branches.
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,
    /// Optional deadline applied to each rule execution.
    #[serde(default)]
    pub rule_timeout_ms: Option<u64>,
    /// Revoke managed roles a user no longer qualifies for.
    #[serde(default)]
    pub remove_unwarranted_roles: bool,
    /// Send notices to the user when something goes wrong.
    #[serde(default = "default_notify_on_failure")]
    pub notify_on_failure: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parallelism: default_max_parallelism(),
            rule_timeout_ms: None,
            remove_unwarranted_roles: false,
            notify_on_failure: default_notify_on_failure(),
        }
    }
}

impl SyncConfig {
    /// Validates sync settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PARALLELISM).contains(&self.max_parallelism) {
            return Err(ConfigError::Invalid(format!(
                "sync.max_parallelism must be between 1 and {MAX_PARALLELISM}"
            )));
        }
        if self.rule_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "sync.rule_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default branch parallelism.
const fn default_max_parallelism() -> usize {
    DEFAULT_MAX_PARALLELISM
}

/// Notices are sent unless disabled.
const fn default_notify_on_failure() -> bool {
    true
}

// ============================================================================
// SECTION: Guild Configuration
// ============================================================================

/// One monitored community as written in `[[guilds]]`.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildConfig {
    /// Community identifier.
    pub id: String,
    /// Optional display name used in messages.
    #[serde(default)]
    pub name: Option<String>,
    /// Platform role ids this engine never removes.
    #[serde(default)]
    pub sticky_roles: Vec<String>,
    /// Abstract role name to platform role id.
    #[serde(default)]
    pub roles: BTreeMap<String, String>,
}

impl GuildConfig {
    /// Validates the guild entry.
    fn validate(&mut self) -> Result<(), ConfigError> {
        self.id = self.id.trim().to_string();
        if self.id.is_empty() {
            return Err(ConfigError::Invalid("guilds.id must be non-empty".to_string()));
        }
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "guilds.name must be non-empty when set (guild {})",
                self.id
            )));
        }
        for (role, role_id) in &self.roles {
            if role.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "guild {} maps an empty role name",
                    self.id
                )));
            }
            if role_id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "guild {} maps role {role} to an empty role id",
                    self.id
                )));
            }
        }
        if self.sticky_roles.iter().any(|role_id| role_id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "guild {} lists an empty sticky role id",
                self.id
            )));
        }
        Ok(())
    }

    /// Converts the entry into the core role configuration.
    #[must_use]
    pub fn to_role_config(&self) -> GuildRoleConfig {
        let mut config = GuildRoleConfig::new(self.id.as_str());
        if let Some(name) = &self.name {
            config = config.with_name(name.as_str());
        }
        for (role, role_id) in &self.roles {
            config = config.with_role(role.as_str(), role_id.as_str());
        }
        for role_id in &self.sticky_roles {
            config = config.with_sticky_role(role_id.as_str());
        }
        config
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or opening a backend.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Log subscriber installation failed.
    #[error("logging error: {0}")]
    Logging(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates the declared role table.
fn validate_roles(roles: &[RoleDeclaration]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for role in roles {
        let name = role.name.as_str();
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid("roles.name must be non-empty".to_string()));
        }
        if StandardRole::from_name(name).is_some() {
            return Err(ConfigError::Invalid(format!(
                "roles.name {name} is reserved for a standard role"
            )));
        }
        if role.rule.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid(format!("role {name} must name a rule")));
        }
        if !seen.insert(name) {
            return Err(ConfigError::Invalid(format!("duplicate role name: {name}")));
        }
    }
    Ok(())
}

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path-valued field against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
