// crates/rolelink-core/src/core/rule.rs
// ============================================================================
// Module: RoleLink Rule Model
// Description: Named authorization predicates split into weak and strong kinds.
// Purpose: Define the immutable rule values consumed by the executor and cache.
// Dependencies: crate::core::{identifiers, roles}, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Rule`] maps a community account's platform attributes to a set of
//! abstract role names. Weak rules only ever see the [`RuleContext`]; strong
//! rules additionally receive the verified identity string, and only when one
//! was disclosed for the current resolution.
//!
//! Predicates are asynchronous because they may call external services. They
//! are stored as shared closures so a [`Rule`] is cheap to clone across tasks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::RuleName;
use crate::core::identifiers::UserId;
use crate::core::roles::RoleSet;

// ============================================================================
// SECTION: Rule Context
// ============================================================================

/// Platform attributes of the community account a rule is evaluated for.
///
/// # Invariants
/// - Never carries the verified identity; strong rules receive it separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleContext {
    /// Platform user identifier.
    pub user_id: UserId,
    /// Platform display name.
    pub display_name: String,
    /// Platform discriminator (legacy four-digit tag or `0`).
    pub discriminator: String,
}

impl RuleContext {
    /// Creates a rule context from platform attributes.
    #[must_use]
    pub fn new(
        user_id: UserId,
        display_name: impl Into<String>,
        discriminator: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            discriminator: discriminator.into(),
        }
    }
}

// ============================================================================
// SECTION: Predicate Errors
// ============================================================================

/// Rule-level failure raised while evaluating a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PredicateError {
    /// Predicate reported an error.
    #[error("rule predicate failed: {0}")]
    Failed(String),
    /// Predicate returned data the engine cannot accept.
    #[error("rule predicate returned malformed roles: {0}")]
    Malformed(String),
    /// Predicate panicked while being built or polled.
    #[error("rule predicate panicked: {0}")]
    Panicked(String),
    /// Predicate exceeded the caller-imposed deadline.
    #[error("rule predicate timed out after {timeout_ms} ms")]
    TimedOut {
        /// Deadline that elapsed, in milliseconds.
        timeout_ms: u64,
    },
}

// ============================================================================
// SECTION: Predicates
// ============================================================================

/// Boxed future returned by every predicate.
pub type PredicateFuture<T> = Pin<Box<dyn Future<Output = Result<T, PredicateError>> + Send>>;

/// Weak predicate: evaluated from platform attributes only.
pub type WeakPredicate = Arc<dyn Fn(RuleContext) -> PredicateFuture<RoleSet> + Send + Sync>;

/// Strong predicate: evaluated with the verified identity string.
pub type StrongPredicate =
    Arc<dyn Fn(RuleContext, String) -> PredicateFuture<RoleSet> + Send + Sync>;

/// Email validator hook attached to a rulebook.
pub type EmailValidator = Arc<dyn Fn(String) -> PredicateFuture<bool> + Send + Sync>;

/// Closed set of predicate shapes.
#[derive(Clone)]
pub enum RuleKind {
    /// Rule that never needs the verified identity.
    Weak(WeakPredicate),
    /// Rule that requires the verified identity to produce roles.
    Strong(StrongPredicate),
}

impl RuleKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Weak(_) => "weak",
            Self::Strong(_) => "strong",
        }
    }
}

impl fmt::Debug for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Rule
// ============================================================================

/// Named authorization rule.
///
/// # Invariants
/// - Immutable once constructed.
/// - `cache_duration` of `None` means results are never cached.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Unique rule name.
    name: RuleName,
    /// Cache lifetime for this rule's results.
    cache_duration: Option<Duration>,
    /// Predicate shape and implementation.
    kind: RuleKind,
}

impl Rule {
    /// Creates a rule from an explicit kind.
    #[must_use]
    pub fn new(
        name: impl Into<RuleName>,
        cache_duration: Option<Duration>,
        kind: RuleKind,
    ) -> Self {
        Self {
            name: name.into(),
            cache_duration,
            kind,
        }
    }

    /// Creates a weak rule from an async closure.
    #[must_use]
    pub fn weak<F, Fut>(
        name: impl Into<RuleName>,
        cache_duration: Option<Duration>,
        predicate: F,
    ) -> Self
    where
        F: Fn(RuleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RoleSet, PredicateError>> + Send + 'static,
    {
        let predicate: WeakPredicate = Arc::new(move |ctx| Box::pin(predicate(ctx)));
        Self::new(name, cache_duration, RuleKind::Weak(predicate))
    }

    /// Creates a strong rule from an async closure.
    #[must_use]
    pub fn strong<F, Fut>(
        name: impl Into<RuleName>,
        cache_duration: Option<Duration>,
        predicate: F,
    ) -> Self
    where
        F: Fn(RuleContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RoleSet, PredicateError>> + Send + 'static,
    {
        let predicate: StrongPredicate =
            Arc::new(move |ctx, identity| Box::pin(predicate(ctx, identity)));
        Self::new(name, cache_duration, RuleKind::Strong(predicate))
    }

    /// Returns the rule name.
    #[must_use]
    pub const fn name(&self) -> &RuleName {
        &self.name
    }

    /// Returns the cache lifetime, if the rule is cacheable.
    #[must_use]
    pub const fn cache_duration(&self) -> Option<Duration> {
        self.cache_duration
    }

    /// Returns the predicate kind.
    #[must_use]
    pub const fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Returns true when the rule requires the verified identity.
    #[must_use]
    pub const fn is_strong(&self) -> bool {
        matches!(self.kind, RuleKind::Strong(_))
    }

    /// Returns true when results of this rule may be cached.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.cache_duration.is_some_and(|duration| !duration.is_zero())
    }
}
