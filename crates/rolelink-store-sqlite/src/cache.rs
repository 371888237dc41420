// crates/rolelink-store-sqlite/src/cache.rs
// ============================================================================
// Module: SQLite Rule Cache Backend
// Description: Durable CacheBackend backed by SQLite.
// Purpose: Persist rule results and per-user index sets across restarts.
// Dependencies: rolelink-core, rusqlite, serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`SqliteCacheBackend`] stores each cache entry as a JSON array of members
//! with an absolute expiry in unix milliseconds. Expired rows are treated as
//! absent and deleted when read; [`SqliteCacheBackend::purge_expired`] sweeps
//! the rest. Index sets live in their own table and are drained inside a
//! single transaction. All database work runs on tokio's blocking pool.
//! Security posture: database contents are untrusted and decoded fail-closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use rolelink_core::CacheBackend;
use rolelink_core::CacheError;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the cache.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for the `SQLite` cache backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteCacheConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
}

impl SqliteCacheConfig {
    /// Creates a configuration with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` cache errors.
#[derive(Debug, Error)]
pub enum SqliteCacheError {
    /// Filesystem error.
    #[error("sqlite cache io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite cache db error: {0}")]
    Db(String),
    /// Stored row could not be decoded.
    #[error("sqlite cache corruption: {0}")]
    Corrupt(String),
    /// Schema version mismatch.
    #[error("sqlite cache version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid configuration or input.
    #[error("sqlite cache invalid input: {0}")]
    Invalid(String),
}

impl From<SqliteCacheError> for CacheError {
    fn from(error: SqliteCacheError) -> Self {
        match error {
            SqliteCacheError::Corrupt(message) => Self::Corrupt(message),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Maps a `rusqlite` error to a cache error.
fn db_error(err: rusqlite::Error) -> SqliteCacheError {
    SqliteCacheError::Db(err.to_string())
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// `SQLite`-backed rule cache storage.
#[derive(Clone)]
pub struct SqliteCacheBackend {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteCacheBackend {
    /// Opens or creates the cache database.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCacheError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteCacheConfig) -> Result<Self, SqliteCacheError> {
        validate_cache_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Deletes every expired entry and returns how many were removed.
    ///
    /// Index members whose entry no longer exists are removed in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCacheError`] when the sweep fails.
    pub async fn purge_expired(&self) -> Result<usize, SqliteCacheError> {
        self.blocking(|connection| {
            let tx = connection.transaction().map_err(db_error)?;
            let purged = tx
                .execute(
                    "DELETE FROM cache_entries WHERE expires_at_ms <= ?1",
                    params![unix_millis()],
                )
                .map_err(db_error)?;
            tx.execute(
                "DELETE FROM cache_index WHERE member NOT IN (SELECT key FROM cache_entries)",
                params![],
            )
            .map_err(db_error)?;
            tx.commit().map_err(db_error)?;
            Ok(purged)
        })
        .await
    }

    /// Runs a closure against the connection on the blocking pool.
    async fn blocking<T, F>(&self, operation: F) -> Result<T, SqliteCacheError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, SqliteCacheError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection
                .lock()
                .map_err(|_| SqliteCacheError::Db("mutex poisoned".to_string()))?;
            operation(&mut guard)
        })
        .await
        .map_err(|err| SqliteCacheError::Db(format!("blocking task failed: {err}")))?
    }
}

#[async_trait]
impl CacheBackend for SqliteCacheBackend {
    async fn get_members(&self, key: &str) -> Result<Option<Vec<String>>, CacheError> {
        let key = key.to_string();
        let row = self
            .blocking(move |connection| {
                let row: Option<(String, i64)> = connection
                    .query_row(
                        "SELECT members, expires_at_ms FROM cache_entries WHERE key = ?1",
                        params![key],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()
                    .map_err(db_error)?;
                match row {
                    Some((_, expires_at_ms)) if expires_at_ms <= unix_millis() => {
                        connection
                            .execute(
                                "DELETE FROM cache_entries WHERE key = ?1 AND expires_at_ms = ?2",
                                params![key, expires_at_ms],
                            )
                            .map_err(db_error)?;
                        Ok(None)
                    }
                    Some((members, _)) => Ok(Some(members)),
                    None => Ok(None),
                }
            })
            .await?;
        let Some(members) = row else {
            return Ok(None);
        };
        let members: Vec<String> = serde_json::from_str(&members)
            .map_err(|err| SqliteCacheError::Corrupt(format!("undecodable members: {err}")))?;
        Ok(Some(members))
    }

    async fn replace_members(
        &self,
        key: &str,
        members: Vec<String>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = key.to_string();
        let members = serde_json::to_string(&members)
            .map_err(|err| SqliteCacheError::Invalid(err.to_string()))?;
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at_ms = unix_millis().saturating_add(ttl_ms);
        self.blocking(move |connection| {
            connection
                .execute(
                    "INSERT INTO cache_entries (key, members, expires_at_ms) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(key) DO UPDATE SET members = excluded.members, expires_at_ms = \
                     excluded.expires_at_ms",
                    params![key, members, expires_at_ms],
                )
                .map_err(db_error)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        let keys = keys.to_vec();
        self.blocking(move |connection| {
            let tx = connection.transaction().map_err(db_error)?;
            for key in &keys {
                tx.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
                    .map_err(db_error)?;
            }
            tx.commit().map_err(db_error)
        })
        .await?;
        Ok(())
    }

    async fn index_add(&self, index_key: &str, member: &str) -> Result<(), CacheError> {
        let index_key = index_key.to_string();
        let member = member.to_string();
        self.blocking(move |connection| {
            connection
                .execute(
                    "INSERT OR IGNORE INTO cache_index (index_key, member) VALUES (?1, ?2)",
                    params![index_key, member],
                )
                .map_err(db_error)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn index_drain(&self, index_key: &str) -> Result<Vec<String>, CacheError> {
        let index_key = index_key.to_string();
        let members = self
            .blocking(move |connection| {
                let tx = connection.transaction().map_err(db_error)?;
                let members = {
                    let mut statement = tx
                        .prepare(
                            "SELECT member FROM cache_index WHERE index_key = ?1 ORDER BY member",
                        )
                        .map_err(db_error)?;
                    let rows = statement
                        .query_map(params![index_key], |row| row.get::<_, String>(0))
                        .map_err(db_error)?;
                    rows.collect::<Result<Vec<String>, _>>().map_err(db_error)?
                };
                tx.execute("DELETE FROM cache_index WHERE index_key = ?1", params![index_key])
                    .map_err(db_error)?;
                tx.commit().map_err(db_error)?;
                Ok(members)
            })
            .await?;
        Ok(members)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the database exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteCacheError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteCacheError::Io("cache path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteCacheError::Io(err.to_string()))
}

/// Validates cache paths for safety limits.
fn validate_cache_path(path: &Path) -> Result<(), SqliteCacheError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteCacheError::Invalid("cache path is empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteCacheError::Invalid("cache path exceeds length limit".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(SqliteCacheError::Invalid(
            "cache path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteCacheError::Invalid(
            "cache path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection and applies pragmas.
fn open_connection(config: &SqliteCacheConfig) -> Result<Connection, SqliteCacheError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_error)?;
    Ok(connection)
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteCacheError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS cache_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM cache_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO cache_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS cache_entries (
                    key TEXT PRIMARY KEY,
                    members TEXT NOT NULL,
                    expires_at_ms INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_cache_entries_expiry
                    ON cache_entries (expires_at_ms);
                CREATE TABLE IF NOT EXISTS cache_index (
                    index_key TEXT NOT NULL,
                    member TEXT NOT NULL,
                    PRIMARY KEY (index_key, member)
                );",
            )
            .map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteCacheError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
