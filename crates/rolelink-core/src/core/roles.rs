// crates/rolelink-core/src/core/roles.rs
// ============================================================================
// Module: RoleLink Standard Roles
// Description: Role set alias and the two implicitly granted standard roles.
// Purpose: Keep reserved role names in one place for rules, config, and sync.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Standard roles are never produced by rule predicates. `_known` is granted
//! to every registered user and `_identified` only when the verified identity
//! was disclosed for the resolution that computed the role set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RoleName;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Ordered set of abstract role names.
pub type RoleSet = BTreeSet<RoleName>;

/// Reserved role names granted by the role manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardRole {
    /// The user completed registration.
    Known,
    /// The user's verified identity was disclosed for this resolution.
    Identified,
}

impl StandardRole {
    /// All standard roles.
    pub const ALL: [Self; 2] = [Self::Known, Self::Identified];

    /// Returns the reserved role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Known => "_known",
            Self::Identified => "_identified",
        }
    }

    /// Returns the reserved role name as a [`RoleName`].
    #[must_use]
    pub fn role_name(self) -> RoleName {
        RoleName::new(self.as_str())
    }

    /// Parses a reserved role name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == name)
    }

    /// Returns true when the name is reserved for a standard role.
    #[must_use]
    pub fn is_standard(name: &RoleName) -> bool {
        Self::from_name(name.as_str()).is_some()
    }
}

/// Builds a role set from string slices.
#[must_use]
pub fn role_set<'a>(names: impl IntoIterator<Item = &'a str>) -> RoleSet {
    names.into_iter().map(RoleName::from).collect()
}
