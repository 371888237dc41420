// crates/rolelink-core/src/runtime/relevance.rs
// ============================================================================
// Module: RoleLink Relevance Resolution
// Description: Computes which rules a set of communities depends on.
// Purpose: Run only the rules whose roles some community actually maps.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! For each community, mapped role names (minus the standard roles) are looked
//! up in the role declaration table, grouped by rule, and resolved against the
//! rulebook. Undeclared roles and rules missing from the rulebook are dropped
//! silently; configuration validation reports them separately.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::CommunityId;
use crate::core::GuildRoleConfig;
use crate::core::RoleDeclarations;
use crate::core::Rule;
use crate::core::RuleName;
use crate::core::Rulebook;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A rule together with the communities that need its output.
#[derive(Debug, Clone)]
pub struct RelevantRule {
    /// Resolved rule.
    pub rule: Arc<Rule>,
    /// Communities requiring the rule.
    pub communities: BTreeSet<CommunityId>,
}

/// Rules relevant to a resolution, keyed by rule name.
#[derive(Debug, Clone, Default)]
pub struct RelevantRules {
    /// Relevant rules keyed by name.
    rules: BTreeMap<RuleName, RelevantRule>,
}

impl RelevantRules {
    /// Returns the entry for a rule name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RelevantRule> {
        self.rules.get(name)
    }

    /// Iterates over relevant rules in name order.
    pub fn iter(&self) -> impl Iterator<Item = &RelevantRule> {
        self.rules.values()
    }

    /// Returns the number of relevant rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rule is relevant.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true when any relevant rule is strong.
    #[must_use]
    pub fn requires_identity(&self) -> bool {
        self.rules.values().any(|entry| entry.rule.is_strong())
    }

    /// Returns the communities that require a strong rule.
    #[must_use]
    pub fn strong_rule_communities(&self) -> BTreeSet<CommunityId> {
        self.rules
            .values()
            .filter(|entry| entry.rule.is_strong())
            .flat_map(|entry| entry.communities.iter().cloned())
            .collect()
    }
}

impl IntoIterator for RelevantRules {
    type IntoIter = std::collections::btree_map::IntoValues<RuleName, RelevantRule>;
    type Item = RelevantRule;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.into_values()
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Computes the rules required by the given communities.
#[must_use]
pub fn relevant_rules<'a>(
    rulebook: &Rulebook,
    declarations: &RoleDeclarations,
    configs: impl IntoIterator<Item = &'a GuildRoleConfig>,
) -> RelevantRules {
    let mut by_rule: BTreeMap<RuleName, BTreeSet<CommunityId>> = BTreeMap::new();
    for config in configs {
        for rule_name in config.required_rule_names(declarations) {
            by_rule.entry(rule_name).or_default().insert(config.community_id.clone());
        }
    }
    let rules = by_rule
        .into_iter()
        .filter_map(|(name, communities)| {
            let rule = Arc::clone(rulebook.lookup(name.as_str())?);
            Some((
                name,
                RelevantRule {
                    rule,
                    communities,
                },
            ))
        })
        .collect();
    RelevantRules {
        rules,
    }
}
