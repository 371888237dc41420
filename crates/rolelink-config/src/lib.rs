// crates/rolelink-config/src/lib.rs
// ============================================================================
// Module: RoleLink Config Library
// Description: Canonical config model, validation, and rulebook cross-checks.
// Purpose: Single source of truth for rolelink.toml semantics.
// Dependencies: rolelink-core, rolelink-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `rolelink-config` defines the configuration model for RoleLink: the role
//! declaration table, monitored guilds, cache backend selection, and sync
//! tuning. It provides strict, fail-closed validation, builds the core values
//! the role manager consumes, and installs the log subscriber.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod logging;
pub mod report;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use logging::LoggingConfig;
pub use report::ConfigFinding;
pub use report::ConfigReport;
pub use report::Severity;
