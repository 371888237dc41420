// crates/rolelink-core/src/runtime/cache.rs
// ============================================================================
// Module: RoleLink Rule Cache
// Description: Per-user rule result cache with TTL and bulk invalidation.
// Purpose: Avoid re-running rules while allowing O(keys-of-user) invalidation.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Rule results are stored under `(rule, user)` keys with the rule's cache
//! duration as TTL. Every write also records the key in a per-user index set,
//! so [`RuleCache::invalidate_user`] only touches that user's keys.
//!
//! An empty role set is written as a single sentinel member. Empty strings are
//! never valid role names, so the sentinel cannot collide with real output.
//!
//! Concurrent `put` and `invalidate_user` calls for the same user may leave one
//! stale entry behind until it expires; no lock spans the two operations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::core::RoleName;
use crate::core::RoleSet;
use crate::core::Rule;
use crate::core::RuleName;
use crate::core::UserId;
use crate::interfaces::CacheBackend;
use crate::interfaces::CacheError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Member stored in place of an empty role set.
pub const NO_ROLES_SENTINEL: &str = "";
/// Default prefix applied to every cache key.
pub const DEFAULT_KEY_PREFIX: &str = "rl_";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheResult {
    /// Cached roles (possibly empty).
    Hit(RoleSet),
    /// Nothing cached, or the rule is uncacheable.
    NotFound,
}

/// Rule result cache over an optional backend.
#[derive(Clone)]
pub struct RuleCache {
    /// Storage backend; `None` disables caching.
    backend: Option<Arc<dyn CacheBackend>>,
    /// Prefix applied to entry and index keys.
    prefix: String,
}

impl RuleCache {
    /// Creates a cache over a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend: Some(backend),
            prefix: prefix.into(),
        }
    }

    /// Creates a cache that never stores anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            backend: None,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Returns true when a backend is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Returns the entry key for a rule and user.
    #[must_use]
    pub fn entry_key(&self, rule: &RuleName, user_id: &UserId) -> String {
        format!("{}roles:{rule}:{user_id}", self.prefix)
    }

    /// Returns the index key listing a user's live entries.
    #[must_use]
    pub fn index_key(&self, user_id: &UserId) -> String {
        format!("{}index:{user_id}", self.prefix)
    }

    /// Looks up cached roles.
    ///
    /// Uncacheable rules return [`CacheResult::NotFound`] without touching storage.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    pub async fn try_get(&self, rule: &Rule, user_id: &UserId) -> Result<CacheResult, CacheError> {
        let Some(backend) = self.backend_for(rule) else {
            return Ok(CacheResult::NotFound);
        };
        let key = self.entry_key(rule.name(), user_id);
        let Some(members) = backend.get_members(&key).await? else {
            return Ok(CacheResult::NotFound);
        };
        Ok(decode_members(members))
    }

    /// Stores roles for a rule and user, replacing any previous value.
    ///
    /// Empty role names are rejected because the empty string is the
    /// empty-set sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidValue`] for an empty role name and
    /// [`CacheError`] when the backend fails.
    pub async fn put(
        &self,
        rule: &Rule,
        user_id: &UserId,
        roles: &RoleSet,
    ) -> Result<(), CacheError> {
        let (Some(backend), Some(ttl)) = (self.backend_for(rule), rule.cache_duration()) else {
            return Ok(());
        };
        if roles.iter().any(|role| role.as_str() == NO_ROLES_SENTINEL) {
            return Err(CacheError::InvalidValue(format!(
                "rule {} produced an empty role name",
                rule.name()
            )));
        }
        let key = self.entry_key(rule.name(), user_id);
        backend.replace_members(&key, encode_roles(roles), ttl).await?;
        backend.index_add(&self.index_key(user_id), &key).await
    }

    /// Removes every cached entry for a user and empties the user's index.
    ///
    /// Returns the number of entry keys that were drained.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    pub async fn invalidate_user(&self, user_id: &UserId) -> Result<usize, CacheError> {
        let Some(backend) = &self.backend else {
            return Ok(0);
        };
        let keys = backend.index_drain(&self.index_key(user_id)).await?;
        if !keys.is_empty() {
            backend.delete(&keys).await?;
        }
        Ok(keys.len())
    }

    /// Returns the backend when the rule is cacheable.
    fn backend_for(&self, rule: &Rule) -> Option<&Arc<dyn CacheBackend>> {
        if rule.is_cacheable() { self.backend.as_ref() } else { None }
    }
}

impl fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCache")
            .field("enabled", &self.is_enabled())
            .field("prefix", &self.prefix)
            .finish()
    }
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes roles as backend members, using the sentinel for an empty set.
fn encode_roles(roles: &RoleSet) -> Vec<String> {
    if roles.is_empty() {
        return vec![NO_ROLES_SENTINEL.to_string()];
    }
    roles.iter().map(|role| role.as_str().to_string()).collect()
}

/// Decodes backend members into a cache result.
fn decode_members(members: Vec<String>) -> CacheResult {
    if members.is_empty() {
        return CacheResult::NotFound;
    }
    CacheResult::Hit(
        members
            .into_iter()
            .filter(|member| member != NO_ROLES_SENTINEL)
            .map(RoleName::from)
            .collect(),
    )
}
