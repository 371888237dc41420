// crates/rolelink-core/src/core/guild.rs
// ============================================================================
// Module: RoleLink Guild Role Configuration
// Description: Role declarations and per-community role mappings.
// Purpose: Describe which abstract roles each community cares about.
// Dependencies: crate::core::{identifiers, roles}, serde
// ============================================================================

//! ## Overview
//! Role declarations form the global table that says which rule determines
//! each abstract role. A [`GuildRoleConfig`] maps abstract role names to the
//! platform role identifiers of one community and lists sticky roles that
//! this engine must never remove.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CommunityId;
use crate::core::identifiers::RoleId;
use crate::core::identifiers::RoleName;
use crate::core::identifiers::RuleName;
use crate::core::roles::RoleSet;
use crate::core::roles::StandardRole;

// ============================================================================
// SECTION: Role Declarations
// ============================================================================

/// Declaration of one abstract role and the rule that determines it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDeclaration {
    /// Abstract role name.
    pub name: RoleName,
    /// Optional human-readable name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Rule whose output grants this role.
    pub rule: RuleName,
}

/// Global table of declared roles keyed by role name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDeclarations {
    /// Declarations keyed by role name.
    roles: BTreeMap<RoleName, RoleDeclaration>,
}

impl RoleDeclarations {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a declaration.
    pub fn insert(&mut self, declaration: RoleDeclaration) {
        self.roles.insert(declaration.name.clone(), declaration);
    }

    /// Returns the declaration for a role.
    #[must_use]
    pub fn get(&self, role: &RoleName) -> Option<&RoleDeclaration> {
        self.roles.get(role)
    }

    /// Returns the rule that determines a role.
    #[must_use]
    pub fn rule_for(&self, role: &RoleName) -> Option<&RuleName> {
        self.roles.get(role).map(|declaration| &declaration.rule)
    }

    /// Iterates over declarations in role-name order.
    pub fn iter(&self) -> impl Iterator<Item = &RoleDeclaration> {
        self.roles.values()
    }

    /// Returns the number of declared roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns true when no roles are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl FromIterator<RoleDeclaration> for RoleDeclarations {
    fn from_iter<I: IntoIterator<Item = RoleDeclaration>>(iter: I) -> Self {
        let mut table = Self::new();
        for declaration in iter {
            table.insert(declaration);
        }
        table
    }
}

// ============================================================================
// SECTION: Guild Role Configuration
// ============================================================================

/// Role configuration for a single monitored community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRoleConfig {
    /// Community identifier.
    pub community_id: CommunityId,
    /// Optional human-readable community name.
    #[serde(default)]
    pub name: Option<String>,
    /// Abstract role name to platform role identifier.
    #[serde(default)]
    pub role_mapping: BTreeMap<RoleName, RoleId>,
    /// Platform role identifiers this engine must never remove.
    #[serde(default)]
    pub sticky_role_ids: BTreeSet<RoleId>,
}

impl GuildRoleConfig {
    /// Creates a configuration with no mappings.
    #[must_use]
    pub fn new(community_id: impl Into<CommunityId>) -> Self {
        Self {
            community_id: community_id.into(),
            name: None,
            role_mapping: BTreeMap::new(),
            sticky_role_ids: BTreeSet::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a role mapping.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<RoleName>, role_id: impl Into<RoleId>) -> Self {
        self.role_mapping.insert(role.into(), role_id.into());
        self
    }

    /// Adds a sticky role identifier.
    #[must_use]
    pub fn with_sticky_role(mut self, role_id: impl Into<RoleId>) -> Self {
        self.sticky_role_ids.insert(role_id.into());
        self
    }

    /// Returns the label used in human-readable messages.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} ({})", self.community_id),
            None => self.community_id.to_string(),
        }
    }

    /// Returns mapped role names excluding the standard roles.
    pub fn rule_driven_roles(&self) -> impl Iterator<Item = &RoleName> {
        self.role_mapping.keys().filter(|role| !StandardRole::is_standard(role))
    }

    /// Returns the rule names this community depends on.
    ///
    /// Roles declared nowhere in `declarations` contribute nothing.
    #[must_use]
    pub fn required_rule_names(&self, declarations: &RoleDeclarations) -> BTreeSet<RuleName> {
        self.rule_driven_roles().filter_map(|role| declarations.rule_for(role)).cloned().collect()
    }

    /// Maps abstract roles to platform role identifiers, dropping unmapped names.
    #[must_use]
    pub fn map_roles(&self, roles: &RoleSet) -> BTreeSet<RoleId> {
        roles.iter().filter_map(|role| self.role_mapping.get(role)).cloned().collect()
    }

    /// Returns every platform role identifier managed by this configuration.
    #[must_use]
    pub fn managed_role_ids(&self) -> BTreeSet<RoleId> {
        self.role_mapping.values().cloned().collect()
    }

    /// Returns true when the role identifier is sticky.
    #[must_use]
    pub fn is_sticky(&self, role_id: &RoleId) -> bool {
        self.sticky_role_ids.contains(role_id)
    }
}
