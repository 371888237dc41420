// crates/rolelink-core/src/runtime/executor.rs
// ============================================================================
// Module: RoleLink Rule Executor
// Description: Runs one rule against one user with isolated failure handling.
// Purpose: Convert predicate errors and panics into typed rule results.
// Dependencies: crate::core, futures-util
// ============================================================================

//! ## Overview
//! [`execute`] invokes a rule's predicate exactly once and never lets a
//! failure escape: predicate errors, panics while building the future, and
//! panics while polling it all become [`RuleResult::Failure`]. A strong rule
//! evaluated without a disclosed identity yields an empty success and its
//! predicate is not called.
//!
//! The executor imposes no deadline; callers wrap it when they need one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;

use futures_util::FutureExt;

use crate::core::PredicateError;
use crate::core::RoleSet;
use crate::core::Rule;
use crate::core::RuleContext;
use crate::core::RuleKind;
use crate::core::StandardRole;

// ============================================================================
// SECTION: Results
// ============================================================================

/// Outcome of a single rule execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleResult {
    /// Predicate produced a role set.
    Success(RoleSet),
    /// Predicate failed; the rule contributes no roles.
    Failure(PredicateError),
}

impl RuleResult {
    /// Returns the produced roles, or an empty set on failure.
    #[must_use]
    pub fn into_roles(self) -> RoleSet {
        match self {
            Self::Success(roles) => roles,
            Self::Failure(_) => RoleSet::new(),
        }
    }
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Executes a rule for a user.
///
/// `identity` is only forwarded to strong rules; weak rules never see it.
pub async fn execute(rule: &Rule, ctx: RuleContext, identity: Option<&str>) -> RuleResult {
    let built = match rule.kind() {
        RuleKind::Weak(predicate) => catch_unwind(AssertUnwindSafe(|| predicate(ctx))),
        RuleKind::Strong(predicate) => {
            let Some(identity) = identity else {
                return RuleResult::Success(RoleSet::new());
            };
            let identity = identity.to_string();
            catch_unwind(AssertUnwindSafe(|| predicate(ctx, identity)))
        }
    };
    let future = match built {
        Ok(future) => future,
        Err(payload) => return RuleResult::Failure(panic_error(payload.as_ref())),
    };
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(roles)) => check_roles(roles),
        Ok(Err(error)) => RuleResult::Failure(error),
        Err(payload) => RuleResult::Failure(panic_error(payload.as_ref())),
    }
}

/// Rejects role sets containing empty or reserved names.
fn check_roles(roles: RoleSet) -> RuleResult {
    for role in &roles {
        if role.as_str().trim().is_empty() {
            return RuleResult::Failure(PredicateError::Malformed("empty role name".to_string()));
        }
        if StandardRole::is_standard(role) {
            return RuleResult::Failure(PredicateError::Malformed(format!(
                "reserved role name {role} cannot be produced by a rule"
            )));
        }
    }
    RuleResult::Success(roles)
}

/// Extracts a readable message from a panic payload.
fn panic_error(payload: &(dyn Any + Send)) -> PredicateError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    PredicateError::Panicked(message)
}
