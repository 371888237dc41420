// crates/rolelink-core/tests/relevance.rs
// ============================================================================
// Module: Relevance Resolution Tests
// Description: Mapping communities to the rules they depend on.
// Purpose: Ensure only rules behind mapped roles are selected.
// Dependencies: rolelink-core
// ============================================================================
//! ## Overview
//! Verifies that relevance resolution groups communities per rule, skips the
//! standard roles, and silently drops undeclared roles and unknown rules.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod support;

use std::collections::BTreeSet;

use rolelink_core::CommunityId;
use rolelink_core::GuildRoleConfig;
use rolelink_core::Rule;
use rolelink_core::Rulebook;
use rolelink_core::role_set;
use rolelink_core::runtime::relevant_rules;

use crate::support::constant_weak_rule;
use crate::support::declarations;

/// Builds the two-rule rulebook used by these tests.
fn rulebook() -> Rulebook {
    Rulebook::builder()
        .rule(constant_weak_rule("Staff", &["staff"]))
        .rule(Rule::strong("Domain", None, |_ctx, _identity| async { Ok(role_set(["edu"])) }))
        .build()
        .unwrap()
}

/// Verifies rules are grouped with every community that needs them.
#[test]
fn groups_communities_per_rule() {
    let declarations = declarations(&[("staff", "Staff"), ("edu", "Domain")]);
    let first = GuildRoleConfig::new("g1").with_role("staff", "1").with_role("edu", "2");
    let second = GuildRoleConfig::new("g2").with_role("staff", "3");

    let relevant = relevant_rules(&rulebook(), &declarations, [&first, &second]);

    assert_eq!(relevant.len(), 2);
    let staff = relevant.get("Staff").unwrap();
    let expected: BTreeSet<CommunityId> = ["g1", "g2"].into_iter().map(CommunityId::from).collect();
    assert_eq!(staff.communities, expected);
    assert!(relevant.requires_identity());
    assert_eq!(
        relevant.strong_rule_communities(),
        std::iter::once(CommunityId::new("g1")).collect()
    );
}

/// Verifies standard roles never pull in a rule.
#[test]
fn standard_roles_are_not_rule_driven() {
    let declarations = declarations(&[("_known", "Staff"), ("_identified", "Domain")]);
    let config = GuildRoleConfig::new("g1").with_role("_known", "1").with_role("_identified", "2");

    let relevant = relevant_rules(&rulebook(), &declarations, [&config]);

    assert!(relevant.is_empty());
    assert!(!relevant.requires_identity());
}

/// Verifies undeclared roles and unknown rules are dropped silently.
#[test]
fn undeclared_roles_and_unknown_rules_are_dropped() {
    let declarations = declarations(&[("staff", "Staff"), ("ghost", "Missing")]);
    let config = GuildRoleConfig::new("g1")
        .with_role("staff", "1")
        .with_role("ghost", "2")
        .with_role("nobody-declared-me", "3");

    let relevant = relevant_rules(&rulebook(), &declarations, [&config]);

    let names: Vec<&str> = relevant.iter().map(|entry| entry.rule.name().as_str()).collect();
    assert_eq!(names, vec!["Staff"]);
}

/// Verifies no communities means no rules.
#[test]
fn no_communities_no_rules() {
    let declarations = declarations(&[("staff", "Staff")]);

    let relevant = relevant_rules(&rulebook(), &declarations, std::iter::empty());

    assert!(relevant.is_empty());
}
