// crates/rolelink-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Rule Cache
// Description: Durable CacheBackend implementation using SQLite.
// Purpose: Keep rule results across restarts on single-node deployments.
// Dependencies: rolelink-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`CacheBackend`] for the RoleLink rule
//! cache. Entries carry absolute expiry times and per-user index sets are
//! drained atomically, so user invalidation behaves like the in-memory
//! backend while surviving process restarts.
//!
//! [`CacheBackend`]: rolelink_core::CacheBackend

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::SqliteCacheBackend;
pub use cache::SqliteCacheConfig;
pub use cache::SqliteCacheError;
pub use cache::SqliteJournalMode;
