// crates/rolelink-core/src/core/mod.rs
// ============================================================================
// Module: RoleLink Core Types
// Description: Rules, rulebooks, role configuration, and resolution outcomes.
// Purpose: Provide the stable value types shared by runtime and integrations.
// Dependencies: serde, thiserror, arc-swap
// ============================================================================

//! ## Overview
//! Core types describe what is evaluated (rules and rulebooks), what the
//! communities want (role declarations and guild configuration), and what a
//! resolution reports back to its caller.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod guild;
pub mod identifiers;
pub mod outcome;
pub mod roles;
pub mod rule;
pub mod rulebook;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use guild::GuildRoleConfig;
pub use guild::RoleDeclaration;
pub use guild::RoleDeclarations;
pub use identifiers::CommunityId;
pub use identifiers::RoleId;
pub use identifiers::RoleName;
pub use identifiers::RuleName;
pub use identifiers::UserId;
pub use outcome::CommunityOutcome;
pub use outcome::IdentityDisclosure;
pub use outcome::ReconcileStatus;
pub use outcome::ResolutionReport;
pub use outcome::ResolutionStage;
pub use outcome::ResolvedRoles;
pub use outcome::RoleAction;
pub use outcome::RoleOperationFailure;
pub use outcome::RuleFailure;
pub use outcome::SyncReport;
pub use roles::RoleSet;
pub use roles::StandardRole;
pub use roles::role_set;
pub use rule::EmailValidator;
pub use rule::PredicateError;
pub use rule::PredicateFuture;
pub use rule::Rule;
pub use rule::RuleContext;
pub use rule::RuleKind;
pub use rule::StrongPredicate;
pub use rule::WeakPredicate;
pub use rulebook::Rulebook;
pub use rulebook::RulebookBuilder;
pub use rulebook::RulebookError;
pub use rulebook::RulebookHandle;
