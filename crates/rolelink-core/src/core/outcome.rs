// crates/rolelink-core/src/core/outcome.rs
// ============================================================================
// Module: RoleLink Resolution Outcomes
// Description: Structured results of role resolution and reconciliation.
// Purpose: Report rule failures and per-community outcomes without raising.
// Dependencies: crate::core::{identifiers, roles, rule}, serde
// ============================================================================

//! ## Overview
//! A resolution never fails as a whole except when the permission check denies
//! the user. Every other failure is recorded here so callers can notify users
//! or write audit records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CommunityId;
use crate::core::identifiers::RoleId;
use crate::core::identifiers::RuleName;
use crate::core::identifiers::UserId;
use crate::core::roles::RoleSet;
use crate::core::rule::PredicateError;

// ============================================================================
// SECTION: Resolution Stages
// ============================================================================

/// Stages a single resolution moves through, used as log labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStage {
    /// Resolution accepted.
    Start,
    /// Permission checker allowed the user.
    PermissionChecked,
    /// Relevant rules computed.
    RulesIdentified,
    /// Verified identity obtained for strong rules.
    IdentityDisclosed,
    /// Strong rules run without identity.
    IdentitySkipped,
    /// All relevant rules executed or read from cache.
    RulesExecuted,
    /// Standard roles merged into the role set.
    RolesUnioned,
    /// Per-community reconciliation in progress.
    Reconciling,
    /// Resolution finished.
    Done,
}

impl ResolutionStage {
    /// Returns a stable label for the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::PermissionChecked => "permission_checked",
            Self::RulesIdentified => "rules_identified",
            Self::IdentityDisclosed => "identity_disclosed",
            Self::IdentitySkipped => "identity_skipped",
            Self::RulesExecuted => "rules_executed",
            Self::RolesUnioned => "roles_unioned",
            Self::Reconciling => "reconciling",
            Self::Done => "done",
        }
    }
}

// ============================================================================
// SECTION: Rule Outcomes
// ============================================================================

/// Failure of one rule during a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    /// Failed rule.
    pub rule: RuleName,
    /// Failure cause.
    pub error: PredicateError,
}

/// Whether the verified identity was used for this resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IdentityDisclosure {
    /// No strong rule was relevant.
    NotRequired,
    /// A strong rule was relevant but the user never opted into identity storage.
    NotOptedIn,
    /// The identity was disclosed.
    Disclosed,
    /// Disclosure was attempted and failed.
    Failed {
        /// Failure reason.
        reason: String,
    },
}

impl IdentityDisclosure {
    /// Returns true when the identity was disclosed.
    #[must_use]
    pub const fn is_disclosed(&self) -> bool {
        matches!(self, Self::Disclosed)
    }
}

/// Final role set computed for a user, before any community is touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRoles {
    /// Abstract roles, including standard roles.
    pub roles: RoleSet,
    /// Identity disclosure outcome.
    pub identity: IdentityDisclosure,
    /// Rules that failed and contributed nothing.
    pub rule_failures: Vec<RuleFailure>,
    /// True when the cache backend failed and rules ran uncached.
    pub cache_degraded: bool,
}

// ============================================================================
// SECTION: Community Outcomes
// ============================================================================

/// Role mutation attempted on a community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleAction {
    /// Role grant.
    Grant,
    /// Role revocation.
    Revoke,
    /// Listing the member's current roles.
    ListRoles,
}

/// Failed platform call for one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOperationFailure {
    /// Attempted action.
    pub action: RoleAction,
    /// Target role, absent for listing.
    pub role_id: Option<RoleId>,
    /// Platform error message.
    pub error: String,
}

/// Reconciliation status for one community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// Every platform call succeeded (or none was needed).
    Succeeded,
    /// Some platform calls failed.
    Partial,
    /// Every attempted platform call failed.
    Failed,
}

impl ReconcileStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Reconciliation outcome for one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityOutcome {
    /// Community identifier.
    pub community_id: CommunityId,
    /// Aggregate status.
    pub status: ReconcileStatus,
    /// Roles granted successfully.
    pub granted: BTreeSet<RoleId>,
    /// Roles revoked successfully.
    pub revoked: BTreeSet<RoleId>,
    /// Failed platform calls.
    pub failures: Vec<RoleOperationFailure>,
}

impl CommunityOutcome {
    /// Builds an outcome and derives its status from the recorded calls.
    #[must_use]
    pub fn from_operations(
        community_id: CommunityId,
        granted: BTreeSet<RoleId>,
        revoked: BTreeSet<RoleId>,
        failures: Vec<RoleOperationFailure>,
    ) -> Self {
        let succeeded = granted.len() + revoked.len();
        let status = match (succeeded, failures.len()) {
            (_, 0) => ReconcileStatus::Succeeded,
            (0, _) => ReconcileStatus::Failed,
            _ => ReconcileStatus::Partial,
        };
        Self {
            community_id,
            status,
            granted,
            revoked,
            failures,
        }
    }

    /// Builds a failed outcome for a branch that could not run at all.
    #[must_use]
    pub fn aborted(community_id: CommunityId, error: impl Into<String>) -> Self {
        Self {
            community_id,
            status: ReconcileStatus::Failed,
            granted: BTreeSet::new(),
            revoked: BTreeSet::new(),
            failures: vec![RoleOperationFailure {
                action: RoleAction::Grant,
                role_id: None,
                error: error.into(),
            }],
        }
    }
}

// ============================================================================
// SECTION: Resolution Report
// ============================================================================

/// Result of a completed resolution and synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// User the roles were resolved for.
    pub user_id: UserId,
    /// Computed role set and rule outcomes.
    pub resolved: ResolvedRoles,
    /// Outcome per reconciled community, in community order.
    pub communities: Vec<CommunityOutcome>,
}

impl SyncReport {
    /// Returns outcomes that did not fully succeed.
    pub fn unsuccessful(&self) -> impl Iterator<Item = &CommunityOutcome> {
        self.communities.iter().filter(|outcome| outcome.status != ReconcileStatus::Succeeded)
    }
}

/// Top-level result of `resolve_and_sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolutionReport {
    /// The permission checker refused the user; nothing was computed or applied.
    Denied {
        /// Denied user.
        user_id: UserId,
        /// Reason reported by the permission checker.
        reason: String,
    },
    /// Roles were computed and reconciliation ran.
    Synced(SyncReport),
}

impl ResolutionReport {
    /// Returns the sync report when the resolution was not denied.
    #[must_use]
    pub const fn as_synced(&self) -> Option<&SyncReport> {
        match self {
            Self::Synced(report) => Some(report),
            Self::Denied {
                ..
            } => None,
        }
    }
}
