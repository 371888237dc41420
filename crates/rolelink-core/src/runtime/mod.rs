// crates/rolelink-core/src/runtime/mod.rs
// ============================================================================
// Module: RoleLink Runtime
// Description: Rule execution, caching, relevance, and role reconciliation.
// Purpose: Turn a rulebook and guild configuration into applied roles.
// Dependencies: crate::{core, interfaces}, tokio, futures-util, tracing
// ============================================================================

//! ## Overview
//! Runtime modules execute rules in isolation, cache their results per user,
//! compute which rules a set of communities depends on, and drive the
//! end-to-end resolution in [`RoleManager`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod cache;
pub mod executor;
pub mod manager;
pub mod memory_cache;
pub mod notify;
pub mod relevance;
pub mod task_set;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::CacheResult;
pub use cache::DEFAULT_KEY_PREFIX;
pub use cache::NO_ROLES_SENTINEL;
pub use cache::RuleCache;
pub use executor::RuleResult;
pub use executor::execute;
pub use manager::Collaborators;
pub use manager::RoleConfiguration;
pub use manager::RoleManager;
pub use manager::RoleManagerConfig;
pub use manager::SyncRequest;
pub use memory_cache::InMemoryCacheBackend;
pub use notify::LogNotificationSender;
pub use relevance::RelevantRule;
pub use relevance::RelevantRules;
pub use relevance::relevant_rules;
pub use task_set::DEFAULT_MAX_PARALLELISM;
pub use task_set::ParallelTaskSet;
