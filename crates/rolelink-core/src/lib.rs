// crates/rolelink-core/src/lib.rs
// ============================================================================
// Module: RoleLink Core Library
// Description: Public API surface for the RoleLink rule engine.
// Purpose: Expose rule types, collaborator interfaces, and the role manager.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! RoleLink evaluates a rulebook of async predicates against a registered
//! user, caches the results, and reconciles the resulting roles into every
//! chat community the user belongs to. Integrations plug in through the
//! traits in [`interfaces`]: permission checks, audited identity access, the
//! chat platform, notifications, and cache storage.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CacheBackend;
pub use interfaces::CacheError;
pub use interfaces::ChatPlatformClient;
pub use interfaces::IdentityAccessor;
pub use interfaces::IdentityError;
pub use interfaces::JoinDecision;
pub use interfaces::Membership;
pub use interfaces::Notice;
pub use interfaces::NotificationSender;
pub use interfaces::NotifyError;
pub use interfaces::PermissionChecker;
pub use interfaces::PermissionError;
pub use interfaces::PlatformError;
pub use interfaces::PlatformUserInfo;
pub use interfaces::RegisteredUser;
pub use runtime::CacheResult;
pub use runtime::Collaborators;
pub use runtime::InMemoryCacheBackend;
pub use runtime::LogNotificationSender;
pub use runtime::RelevantRules;
pub use runtime::RoleConfiguration;
pub use runtime::RoleManager;
pub use runtime::RoleManagerConfig;
pub use runtime::RuleCache;
pub use runtime::RuleResult;
pub use runtime::SyncRequest;
