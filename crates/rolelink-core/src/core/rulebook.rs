// crates/rolelink-core/src/core/rulebook.rs
// ============================================================================
// Module: RoleLink Rulebook
// Description: Immutable rule registry with an optional email validator.
// Purpose: Provide lookup over loaded rules and atomic whole-rulebook reloads.
// Dependencies: crate::core::rule, arc-swap, thiserror
// ============================================================================

//! ## Overview
//! A [`Rulebook`] is built once through [`RulebookBuilder`] and never mutated.
//! Reloading produces a new rulebook that is swapped into a [`RulebookHandle`];
//! readers keep the snapshot they loaded, so a resolution never observes rules
//! from two rulebooks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::core::identifiers::RuleName;
use crate::core::rule::EmailValidator;
use crate::core::rule::PredicateError;
use crate::core::rule::Rule;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Rulebook construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulebookError {
    /// Two rules were registered under the same name.
    #[error("duplicate rule name: {0}")]
    DuplicateRule(String),
    /// A rule name is empty or whitespace only.
    #[error("invalid rule name: '{0}'")]
    InvalidName(String),
}

// ============================================================================
// SECTION: Rulebook
// ============================================================================

/// Immutable collection of rules keyed by name.
#[derive(Clone, Default)]
pub struct Rulebook {
    /// Rules keyed by unique name.
    rules: BTreeMap<RuleName, Arc<Rule>>,
    /// Optional email format validator.
    email_validator: Option<EmailValidator>,
}

impl Rulebook {
    /// Returns an empty rulebook that accepts every email.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts building a rulebook.
    #[must_use]
    pub fn builder() -> RulebookBuilder {
        RulebookBuilder::default()
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Arc<Rule>> {
        self.rules.get(name)
    }

    /// Iterates over every rule in name order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.values()
    }

    /// Returns the number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true when an email validator is configured.
    #[must_use]
    pub const fn has_email_validator(&self) -> bool {
        self.email_validator.is_some()
    }

    /// Validates an email address with the configured validator.
    ///
    /// Without a validator every address is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`PredicateError`] when the validator itself fails.
    pub async fn validate_email(&self, email: &str) -> Result<bool, PredicateError> {
        match &self.email_validator {
            Some(validator) => validator(email.to_string()).await,
            None => Ok(true),
        }
    }
}

impl fmt::Debug for Rulebook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rulebook")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("email_validator", &self.email_validator.is_some())
            .finish()
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder collecting rules before validation.
#[derive(Default)]
pub struct RulebookBuilder {
    /// Rules in registration order.
    rules: Vec<Rule>,
    /// Optional email format validator.
    email_validator: Option<EmailValidator>,
}

impl RulebookBuilder {
    /// Registers a rule.
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the email validator.
    #[must_use]
    pub fn email_validator<F, Fut>(mut self, validator: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, PredicateError>> + Send + 'static,
    {
        let validator: EmailValidator = Arc::new(move |email| Box::pin(validator(email)));
        self.email_validator = Some(validator);
        self
    }

    /// Validates and freezes the rulebook.
    ///
    /// # Errors
    ///
    /// Returns [`RulebookError`] on duplicate or empty rule names.
    pub fn build(self) -> Result<Rulebook, RulebookError> {
        let mut rules = BTreeMap::new();
        for rule in self.rules {
            let name = rule.name().clone();
            if name.as_str().trim().is_empty() {
                return Err(RulebookError::InvalidName(name.as_str().to_string()));
            }
            if rules.insert(name.clone(), Arc::new(rule)).is_some() {
                return Err(RulebookError::DuplicateRule(name.as_str().to_string()));
            }
        }
        Ok(Rulebook {
            rules,
            email_validator: self.email_validator,
        })
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Shared, atomically replaceable reference to the active rulebook.
#[derive(Clone)]
pub struct RulebookHandle {
    /// Active rulebook snapshot.
    current: Arc<ArcSwap<Rulebook>>,
}

impl RulebookHandle {
    /// Creates a handle around an initial rulebook.
    #[must_use]
    pub fn new(rulebook: Rulebook) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(rulebook)),
        }
    }

    /// Returns the active rulebook snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<Rulebook> {
        self.current.load_full()
    }

    /// Replaces the active rulebook, returning the previous snapshot.
    pub fn replace(&self, rulebook: Rulebook) -> Arc<Rulebook> {
        self.current.swap(Arc::new(rulebook))
    }
}

impl fmt::Debug for RulebookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RulebookHandle").field("current", &self.current()).finish()
    }
}
