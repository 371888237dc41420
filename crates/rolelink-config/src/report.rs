// crates/rolelink-config/src/report.rs
// ============================================================================
// Module: RoleLink Config Report
// Description: Cross-checks configuration against a loaded rulebook.
// Purpose: Surface references that validate syntactically but cannot resolve.
// Dependencies: rolelink-core
// ============================================================================

//! ## Overview
//! A configuration can be well formed and still refer to rules the running
//! rulebook does not define. Such roles are silently unobtainable at
//! resolution time, so [`RoleLinkConfig::check_against`] reports them up
//! front. Warnings flag mappings and declarations that have no effect.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use rolelink_core::RoleName;
use rolelink_core::Rulebook;
use rolelink_core::StandardRole;

use crate::config::RoleLinkConfig;

// ============================================================================
// SECTION: Findings
// ============================================================================

/// Severity of a configuration finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The configuration has no effect somewhere but still works.
    Warning,
    /// A role can never be granted.
    Error,
}

impl Severity {
    /// Returns the lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One configuration finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFinding {
    /// Finding severity.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ConfigFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity.as_str(), self.message)
    }
}

/// Findings produced by [`RoleLinkConfig::check_against`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReport {
    /// Findings in discovery order.
    pub findings: Vec<ConfigFinding>,
}

impl ConfigReport {
    /// Returns true when any finding is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|finding| finding.severity == Severity::Error)
    }

    /// Returns true when there are no findings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Iterates over findings of one severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &ConfigFinding> {
        self.findings.iter().filter(move |finding| finding.severity == severity)
    }

    /// Records a finding.
    fn push(&mut self, severity: Severity, message: String) {
        self.findings.push(ConfigFinding {
            severity,
            message,
        });
    }
}

// ============================================================================
// SECTION: Checks
// ============================================================================

impl RoleLinkConfig {
    /// Cross-checks declared roles and guild mappings against a rulebook.
    #[must_use]
    pub fn check_against(&self, rulebook: &Rulebook) -> ConfigReport {
        let mut report = ConfigReport::default();
        for role in &self.roles {
            if rulebook.lookup(role.rule.as_str()).is_none() {
                report.push(
                    Severity::Error,
                    format!("role {} depends on unknown rule {}", role.name, role.rule),
                );
            }
        }

        let declared: BTreeSet<&RoleName> = self.roles.iter().map(|role| &role.name).collect();
        let mut used = BTreeSet::new();
        for guild in &self.guilds {
            for role in guild.roles.keys() {
                let role = RoleName::new(role.as_str());
                if StandardRole::is_standard(&role) {
                    continue;
                }
                if declared.contains(&role) {
                    used.insert(role);
                } else {
                    report.push(
                        Severity::Warning,
                        format!("guild {} maps undeclared role {role}", guild.id),
                    );
                }
            }
        }

        for role in &self.roles {
            if !used.contains(&role.name) {
                report.push(
                    Severity::Warning,
                    format!("role {} is not mapped by any guild", role.name),
                );
            }
        }
        report
    }
}
