// crates/rolelink-core/src/runtime/memory_cache.rs
// ============================================================================
// Module: RoleLink In-Memory Cache Backend
// Description: Process-local cache backend with manual TTL bookkeeping.
// Purpose: Provide a single-node cache backend without external services.
// Dependencies: crate::interfaces, tokio
// ============================================================================

//! ## Overview
//! [`InMemoryCacheBackend`] keeps entries and index sets in mutex-protected
//! maps. Expiry uses the tokio clock, so tests can drive TTLs with a paused
//! runtime. Expired entries are dropped lazily when they are read, or in bulk
//! together with their index members by [`InMemoryCacheBackend::purge_expired`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::interfaces::CacheBackend;
use crate::interfaces::CacheError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound applied to entry lifetimes so expiry math cannot overflow.
const MAX_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 10);

// ============================================================================
// SECTION: State
// ============================================================================

/// Stored entry with its expiry instant.
#[derive(Debug, Clone)]
struct Entry {
    /// Stored members.
    members: Vec<String>,
    /// Instant after which the entry is dead.
    expires_at: Instant,
}

/// Maps guarded together so index and entries stay coherent per call.
#[derive(Debug, Default)]
struct State {
    /// Live entries keyed by cache key.
    entries: BTreeMap<String, Entry>,
    /// Index sets keyed by index key.
    indexes: BTreeMap<String, BTreeSet<String>>,
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// In-memory cache backend for single-node deployments and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCacheBackend {
    /// Shared state protected by a mutex.
    state: Arc<Mutex<State>>,
}

impl InMemoryCacheBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live entries.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the state mutex is poisoned.
    pub fn live_entries(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let guard = self.lock()?;
        Ok(guard.entries.values().filter(|entry| entry.expires_at > now).count())
    }

    /// Returns the members of an index set.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the state mutex is poisoned.
    pub fn index_members(&self, index_key: &str) -> Result<Vec<String>, CacheError> {
        let guard = self.lock()?;
        Ok(guard
            .indexes
            .get(index_key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Drops expired entries and index members without a live entry.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the state mutex is poisoned.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let mut guard = self.lock()?;
        let State {
            entries,
            indexes,
        } = &mut *guard;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - entries.len();
        for members in indexes.values_mut() {
            members.retain(|member| entries.contains_key(member));
        }
        indexes.retain(|_, members| !members.is_empty());
        drop(guard);
        Ok(purged)
    }

    /// Locks the shared state.
    fn lock(&self) -> Result<MutexGuard<'_, State>, CacheError> {
        self.state
            .lock()
            .map_err(|_| CacheError::Unavailable("in-memory cache mutex poisoned".to_string()))
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get_members(&self, key: &str) -> Result<Option<Vec<String>>, CacheError> {
        let now = Instant::now();
        let mut guard = self.lock()?;
        match guard.entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.members.clone())),
            Some(_) => {
                guard.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn replace_members(
        &self,
        key: &str,
        members: Vec<String>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now);
        self.lock()?.entries.insert(
            key.to_string(),
            Entry {
                members,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut guard = self.lock()?;
        for key in keys {
            guard.entries.remove(key);
        }
        drop(guard);
        Ok(())
    }

    async fn index_add(&self, index_key: &str, member: &str) -> Result<(), CacheError> {
        self.lock()?
            .indexes
            .entry(index_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn index_drain(&self, index_key: &str) -> Result<Vec<String>, CacheError> {
        let drained = self.lock()?.indexes.remove(index_key);
        Ok(drained.map(|set| set.into_iter().collect()).unwrap_or_default())
    }
}
