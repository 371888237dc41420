// crates/rolelink-core/src/interfaces/mod.rs
// ============================================================================
// Module: RoleLink Interfaces
// Description: Collaborator contracts for permissions, identity, platform, cache.
// Purpose: Define the seams the role manager drives without embedding backends.
// Dependencies: crate::core, async-trait, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how RoleLink integrates with the user database, the
//! identity accessor, the chat platform, notification delivery, and the cache
//! backend. Every collaborator reports failures through its own error type so
//! the role manager can isolate them per rule and per community.
//!
//! Security posture: the identity accessor is the only path to the verified
//! identity and is expected to write a durable audit record for every call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::CommunityId;
use crate::core::RoleId;
use crate::core::RuleName;
use crate::core::UserId;

// ============================================================================
// SECTION: Users
// ============================================================================

/// Registered user record as seen by the role manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUser {
    /// Platform user identifier of the linked community account.
    pub user_id: UserId,
    /// True when the user opted into storing their verified identity.
    pub identity_opted_in: bool,
}

/// Platform attributes of a community account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformUserInfo {
    /// Platform display name.
    pub display_name: String,
    /// Platform discriminator.
    pub discriminator: String,
}

/// Presence of the user in one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Community identifier.
    pub community_id: CommunityId,
    /// True when the user is currently a member.
    pub present: bool,
}

impl Membership {
    /// Creates a membership marked present.
    #[must_use]
    pub fn present(community_id: impl Into<CommunityId>) -> Self {
        Self {
            community_id: community_id.into(),
            present: true,
        }
    }
}

// ============================================================================
// SECTION: Permission Checker
// ============================================================================

/// Outcome of the join permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum JoinDecision {
    /// The user may hold roles.
    Allowed,
    /// The user may not hold roles.
    Disallowed {
        /// Human-readable reason.
        reason: String,
    },
}

/// Permission checker errors.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// Permission lookup failed.
    #[error("permission check error: {0}")]
    CheckFailed(String),
}

/// Decides whether a user may be a member of monitored communities.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Checks whether the user may join communities (not banned, registered).
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError`] when the decision cannot be made.
    async fn can_user_join(&self, user: &RegisteredUser) -> Result<JoinDecision, PermissionError>;
}

// ============================================================================
// SECTION: Identity Accessor
// ============================================================================

/// Identity accessor errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No identity is stored for the user.
    #[error("identity not available: {0}")]
    NotAvailable(String),
    /// Identity storage failed.
    #[error("identity access error: {0}")]
    AccessFailed(String),
}

/// Audited, least-privilege access to a user's verified identity.
#[async_trait]
pub trait IdentityAccessor: Send + Sync {
    /// Discloses the identity for one resolution and records an audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the identity cannot be disclosed.
    async fn disclose_identity(
        &self,
        user: &RegisteredUser,
        automated: bool,
        justification: &str,
    ) -> Result<String, IdentityError>;
}

// ============================================================================
// SECTION: Chat Platform Client
// ============================================================================

/// Chat platform errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform rejected the request (missing permission, unknown role).
    #[error("platform rejected request: {0}")]
    Rejected(String),
    /// The platform could not be reached.
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Membership queries and role mutations on the chat platform.
#[async_trait]
pub trait ChatPlatformClient: Send + Sync {
    /// Lists the members of a community.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when the member list cannot be fetched.
    async fn list_membership(
        &self,
        community_id: &CommunityId,
    ) -> Result<BTreeSet<UserId>, PlatformError>;

    /// Lists the role identifiers a member currently holds.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when the member cannot be read.
    async fn member_roles(
        &self,
        community_id: &CommunityId,
        user_id: &UserId,
    ) -> Result<BTreeSet<RoleId>, PlatformError>;

    /// Grants a role to a member. Granting a held role is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when the grant fails.
    async fn grant_role(
        &self,
        community_id: &CommunityId,
        user_id: &UserId,
        role_id: &RoleId,
    ) -> Result<(), PlatformError>;

    /// Revokes a role from a member. Revoking a missing role is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when the revocation fails.
    async fn revoke_role(
        &self,
        community_id: &CommunityId,
        user_id: &UserId,
        role_id: &RoleId,
    ) -> Result<(), PlatformError>;
}

// ============================================================================
// SECTION: Notification Sender
// ============================================================================

/// Human-readable outcome delivered to a user or an audit channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The user may not join monitored communities.
    JoinDenied {
        /// Reason reported by the permission checker.
        reason: String,
    },
    /// Some rules failed while computing roles.
    RuleFailures {
        /// Failed rule names.
        rules: Vec<RuleName>,
    },
    /// Roles could not be fully applied on a community.
    ReconciliationFailed {
        /// Community label.
        community: String,
        /// Roles whose grant or revocation failed.
        failed_role_ids: Vec<RoleId>,
    },
}

impl Notice {
    /// Renders the notice as a short message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::JoinDenied {
                reason,
            } => format!("You cannot join monitored servers: {reason}"),
            Self::RuleFailures {
                rules,
            } => {
                let names: Vec<&str> = rules.iter().map(RuleName::as_str).collect();
                format!("Some roles could not be computed (failed rules: {})", names.join(", "))
            }
            Self::ReconciliationFailed {
                community,
                failed_role_ids,
            } => {
                if failed_role_ids.is_empty() {
                    format!("Your roles could not be updated on {community}")
                } else {
                    let ids: Vec<&str> = failed_role_ids.iter().map(RoleId::as_str).collect();
                    format!(
                        "Some roles could not be updated on {community} (roles: {})",
                        ids.join(", ")
                    )
                }
            }
        }
    }
}

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Delivery failed.
    #[error("notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Best-effort notification delivery.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Delivers a notice about a user.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails.
    async fn notify(&self, user_id: &UserId, notice: &Notice) -> Result<(), NotifyError>;
}

// ============================================================================
// SECTION: Cache Backend
// ============================================================================

/// Cache backend errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Backend unreachable or failed.
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    /// Stored data could not be decoded.
    #[error("cache backend corruption: {0}")]
    Corrupt(String),
    /// The value cannot be represented in the cache.
    #[error("cache value rejected: {0}")]
    InvalidValue(String),
}

/// Key/value store with per-key TTL and drainable index sets.
///
/// # Invariants
/// - `replace_members` overwrites any prior value for the key.
/// - `index_drain` removes and returns the whole set in one atomic step.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Reads the members stored under a key, if live.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn get_members(&self, key: &str) -> Result<Option<Vec<String>>, CacheError>;

    /// Replaces the members stored under a key and sets its TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn replace_members(
        &self,
        key: &str,
        members: Vec<String>,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Deletes keys; missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Adds a member to an index set.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn index_add(&self, index_key: &str, member: &str) -> Result<(), CacheError>;

    /// Removes an index set and returns its members.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn index_drain(&self, index_key: &str) -> Result<Vec<String>, CacheError>;
}
