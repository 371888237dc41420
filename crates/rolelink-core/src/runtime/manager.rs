// crates/rolelink-core/src/runtime/manager.rs
// ============================================================================
// Module: RoleLink Role Manager
// Description: Resolves a user's roles from the rulebook and applies them.
// Purpose: Orchestrate permission checks, identity disclosure, rule execution,
//          caching, and per-community reconciliation with isolated failures.
// Dependencies: crate::{core, interfaces, runtime}, tokio, tracing
// ============================================================================

//! ## Overview
//! [`RoleManager::resolve_and_sync`] runs one resolution for one user:
//!
//! 1. Ask the permission checker; a refusal ends the resolution.
//! 2. Compute the rules relevant to the communities the user is in.
//! 3. Disclose the verified identity once, only if a strong rule is relevant
//!    and the user opted into identity storage.
//! 4. Execute relevant rules concurrently, reading and filling the cache.
//! 5. Union the results with the standard roles.
//! 6. Reconcile each community concurrently through the platform client.
//!
//! Only the permission check can stop role computation. Rule failures, cache
//! outages, identity errors, and platform errors are recorded in the returned
//! report and never abort other branches.
//!
//! ## Invariants
//! - A resolution reads one rulebook snapshot from start to end.
//! - Weak rules never receive the verified identity.
//! - Sticky roles are never revoked; unmanaged roles are never touched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::CommunityId;
use crate::core::CommunityOutcome;
use crate::core::GuildRoleConfig;
use crate::core::IdentityDisclosure;
use crate::core::PredicateError;
use crate::core::ResolutionReport;
use crate::core::ResolutionStage;
use crate::core::ResolvedRoles;
use crate::core::RoleAction;
use crate::core::RoleDeclarations;
use crate::core::RoleId;
use crate::core::RoleOperationFailure;
use crate::core::RoleSet;
use crate::core::Rule;
use crate::core::RuleContext;
use crate::core::RuleFailure;
use crate::core::RuleName;
use crate::core::RulebookHandle;
use crate::core::StandardRole;
use crate::core::SyncReport;
use crate::core::UserId;
use crate::interfaces::CacheError;
use crate::interfaces::ChatPlatformClient;
use crate::interfaces::IdentityAccessor;
use crate::interfaces::JoinDecision;
use crate::interfaces::Membership;
use crate::interfaces::Notice;
use crate::interfaces::NotificationSender;
use crate::interfaces::PermissionChecker;
use crate::interfaces::PlatformUserInfo;
use crate::interfaces::RegisteredUser;
use crate::runtime::cache::CacheResult;
use crate::runtime::cache::RuleCache;
use crate::runtime::executor;
use crate::runtime::executor::RuleResult;
use crate::runtime::relevance::RelevantRules;
use crate::runtime::relevance::relevant_rules;
use crate::runtime::task_set::DEFAULT_MAX_PARALLELISM;
use crate::runtime::task_set::ParallelTaskSet;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Tuning knobs for the role manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleManagerConfig {
    /// Maximum concurrently running branches per fan-out.
    pub max_parallelism: usize,
    /// Optional deadline applied to each rule execution.
    pub rule_timeout: Option<Duration>,
    /// Revoke managed, non-sticky roles that are no longer warranted.
    pub remove_unwarranted_roles: bool,
    /// Allow notices at all; a request can only narrow this further.
    pub notify_on_failure: bool,
}

impl Default for RoleManagerConfig {
    fn default() -> Self {
        Self {
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            rule_timeout: None,
            remove_unwarranted_roles: false,
            notify_on_failure: true,
        }
    }
}

/// Role declarations and monitored communities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleConfiguration {
    /// Global role declaration table.
    pub declarations: RoleDeclarations,
    /// Monitored communities keyed by identifier.
    pub guilds: BTreeMap<CommunityId, GuildRoleConfig>,
}

impl RoleConfiguration {
    /// Builds a configuration from declarations and guild configs.
    #[must_use]
    pub fn new(
        declarations: RoleDeclarations,
        guilds: impl IntoIterator<Item = GuildRoleConfig>,
    ) -> Self {
        Self {
            declarations,
            guilds: guilds.into_iter().map(|guild| (guild.community_id.clone(), guild)).collect(),
        }
    }
}

/// External collaborators driven by the role manager.
#[derive(Clone)]
pub struct Collaborators {
    /// Join permission checker.
    pub permissions: Arc<dyn PermissionChecker>,
    /// Audited identity accessor.
    pub identity: Arc<dyn IdentityAccessor>,
    /// Chat platform client.
    pub platform: Arc<dyn ChatPlatformClient>,
    /// Notification sender.
    pub notifier: Arc<dyn NotificationSender>,
}

/// Input of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Registered user.
    pub user: RegisteredUser,
    /// Platform attributes of the user's community account.
    pub info: PlatformUserInfo,
    /// Communities and whether the user is present in each.
    pub memberships: Vec<Membership>,
    /// Send notices for this request, if the manager allows notices.
    pub notify_on_failure: bool,
}

// ============================================================================
// SECTION: Branch Results
// ============================================================================

/// Output of one rule branch.
struct RuleBranch {
    /// Rule that ran.
    rule: RuleName,
    /// Roles contributed by the rule.
    roles: RoleSet,
    /// Failure, when the rule contributed nothing because it failed.
    failure: Option<PredicateError>,
}

/// Shared inputs of every rule branch in a resolution.
#[derive(Clone)]
struct RuleRun {
    /// Platform attributes passed to predicates.
    ctx: RuleContext,
    /// Disclosed identity, if any.
    identity: Option<Arc<str>>,
    /// Rule cache.
    cache: RuleCache,
    /// Set once the cache backend fails; later branches bypass it.
    cache_degraded: Arc<AtomicBool>,
    /// Optional per-rule deadline.
    timeout: Option<Duration>,
}

// ============================================================================
// SECTION: Role Manager
// ============================================================================

/// Orchestrates role resolution and reconciliation.
pub struct RoleManager {
    /// Active rulebook.
    rulebook: RulebookHandle,
    /// Role declarations and monitored communities.
    roles: Arc<RoleConfiguration>,
    /// Rule result cache.
    cache: RuleCache,
    /// External collaborators.
    collaborators: Collaborators,
    /// Tuning knobs.
    config: RoleManagerConfig,
}

impl RoleManager {
    /// Creates a role manager.
    #[must_use]
    pub fn new(
        rulebook: RulebookHandle,
        roles: RoleConfiguration,
        cache: RuleCache,
        collaborators: Collaborators,
        config: RoleManagerConfig,
    ) -> Self {
        Self {
            rulebook,
            roles: Arc::new(roles),
            cache,
            collaborators,
            config,
        }
    }

    /// Returns the rulebook handle, for reloads.
    #[must_use]
    pub const fn rulebook(&self) -> &RulebookHandle {
        &self.rulebook
    }

    /// Returns the rule cache.
    #[must_use]
    pub const fn cache(&self) -> &RuleCache {
        &self.cache
    }

    /// Returns the role configuration.
    #[must_use]
    pub fn role_configuration(&self) -> &RoleConfiguration {
        &self.roles
    }

    /// Drops every cached rule result for a user.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the cache backend fails.
    pub async fn invalidate_user(&self, user_id: &UserId) -> Result<usize, CacheError> {
        let drained = self.cache.invalidate_user(user_id).await?;
        debug!(user_id = %user_id, drained, "rule cache invalidated");
        Ok(drained)
    }

    /// Invalidates the user's cache entries, then resolves and syncs.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when invalidation fails; no resolution runs then.
    pub async fn refresh_user(
        &self,
        request: &SyncRequest,
    ) -> Result<ResolutionReport, CacheError> {
        self.invalidate_user(&request.user.user_id).await?;
        Ok(self.resolve_and_sync(request).await)
    }

    /// Queries every monitored community for the user's presence.
    ///
    /// Communities whose member list cannot be fetched are left out.
    pub async fn collect_memberships(&self, user_id: &UserId) -> Vec<Membership> {
        let mut tasks = ParallelTaskSet::new(self.config.max_parallelism);
        for community_id in self.roles.guilds.keys().cloned() {
            let platform = Arc::clone(&self.collaborators.platform);
            let user_id = user_id.clone();
            tasks.spawn(async move {
                match platform.list_membership(&community_id).await {
                    Ok(members) => Some(Membership {
                        present: members.contains(&user_id),
                        community_id,
                    }),
                    Err(err) => {
                        warn!(
                            community_id = %community_id,
                            error = %err,
                            "membership query failed"
                        );
                        None
                    }
                }
            });
        }
        let mut memberships: Vec<Membership> =
            tasks.join_all().await.into_iter().filter_map(|output| output.ok().flatten()).collect();
        memberships.sort_by(|a, b| a.community_id.cmp(&b.community_id));
        memberships
    }

    /// Resolves the user's roles and applies them to every present community.
    ///
    /// This never fails: every error other than a permission refusal is
    /// recorded in the returned report.
    pub async fn resolve_and_sync(&self, request: &SyncRequest) -> ResolutionReport {
        let user = &request.user;
        let notify = self.config.notify_on_failure && request.notify_on_failure;
        log_stage(&user.user_id, ResolutionStage::Start);

        if let Some(reason) = self.check_permission(user).await {
            info!(user_id = %user.user_id, reason = %reason, "user may not join communities");
            if notify {
                self.send_notice(
                    &user.user_id,
                    &Notice::JoinDenied {
                        reason: reason.clone(),
                    },
                )
                .await;
            }
            return ResolutionReport::Denied {
                user_id: user.user_id.clone(),
                reason,
            };
        }
        log_stage(&user.user_id, ResolutionStage::PermissionChecked);

        let communities: BTreeSet<CommunityId> = request
            .memberships
            .iter()
            .filter(|membership| membership.present)
            .filter(|membership| self.roles.guilds.contains_key(&membership.community_id))
            .map(|membership| membership.community_id.clone())
            .collect();

        let resolved = self.resolve_roles(user, &request.info, &communities).await;
        if notify && !resolved.rule_failures.is_empty() {
            let rules = resolved.rule_failures.iter().map(|failure| failure.rule.clone()).collect();
            self.send_notice(
                &user.user_id,
                &Notice::RuleFailures {
                    rules,
                },
            )
            .await;
        }

        log_stage(&user.user_id, ResolutionStage::Reconciling);
        let outcomes = self.reconcile(&user.user_id, &resolved.roles, &communities).await;
        for outcome in &outcomes {
            info!(
                user_id = %user.user_id,
                community_id = %outcome.community_id,
                status = outcome.status.as_str(),
                granted = outcome.granted.len(),
                revoked = outcome.revoked.len(),
                failed = outcome.failures.len(),
                "community reconciled"
            );
        }
        let report = SyncReport {
            user_id: user.user_id.clone(),
            resolved,
            communities: outcomes,
        };
        if notify {
            for outcome in report.unsuccessful() {
                self.send_notice(&user.user_id, &self.reconciliation_notice(outcome)).await;
            }
        }
        log_stage(&user.user_id, ResolutionStage::Done);
        ResolutionReport::Synced(report)
    }

    /// Computes the user's final role set for the given communities.
    ///
    /// No community is modified.
    pub async fn resolve_roles(
        &self,
        user: &RegisteredUser,
        info: &PlatformUserInfo,
        communities: &BTreeSet<CommunityId>,
    ) -> ResolvedRoles {
        let rulebook = self.rulebook.current();
        let configs = communities.iter().filter_map(|community| self.roles.guilds.get(community));
        let relevant = relevant_rules(&rulebook, &self.roles.declarations, configs);
        debug!(
            user_id = %user.user_id,
            stage = ResolutionStage::RulesIdentified.as_str(),
            rules = relevant.len(),
            "relevant rules identified"
        );

        let (identity, disclosure) = self.disclose_identity(user, &relevant).await;
        let stage = if identity.is_some() {
            ResolutionStage::IdentityDisclosed
        } else {
            ResolutionStage::IdentitySkipped
        };
        log_stage(&user.user_id, stage);

        let run = RuleRun {
            ctx: RuleContext::new(
                user.user_id.clone(),
                info.display_name.clone(),
                info.discriminator.clone(),
            ),
            identity,
            cache: self.cache.clone(),
            cache_degraded: Arc::new(AtomicBool::new(false)),
            timeout: self.config.rule_timeout,
        };
        let (mut roles, rule_failures) = self.execute_rules(relevant, &run).await;
        log_stage(&user.user_id, ResolutionStage::RulesExecuted);

        roles.insert(StandardRole::Known.role_name());
        if disclosure.is_disclosed() {
            roles.insert(StandardRole::Identified.role_name());
        }
        log_stage(&user.user_id, ResolutionStage::RolesUnioned);

        ResolvedRoles {
            roles,
            identity: disclosure,
            rule_failures,
            cache_degraded: run.cache_degraded.load(Ordering::SeqCst),
        }
    }

    /// Returns the refusal reason, or `None` when the user may join.
    async fn check_permission(&self, user: &RegisteredUser) -> Option<String> {
        match self.collaborators.permissions.can_user_join(user).await {
            Ok(JoinDecision::Allowed) => None,
            Ok(JoinDecision::Disallowed {
                reason,
            }) => Some(reason),
            Err(err) => {
                warn!(user_id = %user.user_id, error = %err, "permission check failed");
                Some(format!("permission check unavailable: {err}"))
            }
        }
    }

    /// Discloses the identity when a strong rule needs it and the user opted in.
    async fn disclose_identity(
        &self,
        user: &RegisteredUser,
        relevant: &RelevantRules,
    ) -> (Option<Arc<str>>, IdentityDisclosure) {
        if !relevant.requires_identity() {
            return (None, IdentityDisclosure::NotRequired);
        }
        if !user.identity_opted_in {
            return (None, IdentityDisclosure::NotOptedIn);
        }
        let justification = self.justification(&relevant.strong_rule_communities());
        match self.collaborators.identity.disclose_identity(user, true, &justification).await {
            Ok(identity) => {
                info!(user_id = %user.user_id, "identity disclosed for strong rules");
                (Some(Arc::from(identity)), IdentityDisclosure::Disclosed)
            }
            Err(err) => {
                warn!(user_id = %user.user_id, error = %err, "identity disclosure failed");
                (
                    None,
                    IdentityDisclosure::Failed {
                        reason: err.to_string(),
                    },
                )
            }
        }
    }

    /// Builds the audit justification naming the requesting communities.
    fn justification(&self, communities: &BTreeSet<CommunityId>) -> String {
        let labels: Vec<String> = communities
            .iter()
            .map(|community| {
                self.roles
                    .guilds
                    .get(community)
                    .map_or_else(|| community.to_string(), GuildRoleConfig::label)
            })
            .collect();
        format!("Automated role update requested by: {}", labels.join(", "))
    }

    /// Executes relevant rules concurrently and unions their roles.
    async fn execute_rules(
        &self,
        relevant: RelevantRules,
        run: &RuleRun,
    ) -> (RoleSet, Vec<RuleFailure>) {
        let mut tasks = ParallelTaskSet::new(self.config.max_parallelism);
        let mut names = HashMap::new();
        for entry in relevant {
            let rule = entry.rule;
            let run = run.clone();
            let name = rule.name().clone();
            let id = tasks.spawn(async move { run_rule(&rule, run).await });
            names.insert(id, name);
        }

        let mut roles = RoleSet::new();
        let mut failures = Vec::new();
        for output in tasks.join_all().await {
            match output {
                Ok(branch) => {
                    roles.extend(branch.roles);
                    if let Some(error) = branch.failure {
                        failures.push(RuleFailure {
                            rule: branch.rule,
                            error,
                        });
                    }
                }
                Err(err) => {
                    let rule = names
                        .get(&err.id())
                        .cloned()
                        .unwrap_or_else(|| RuleName::new("<unknown>"));
                    warn!(rule = %rule, error = %err, "rule branch aborted");
                    failures.push(RuleFailure {
                        rule,
                        error: PredicateError::Panicked(err.to_string()),
                    });
                }
            }
        }
        failures.sort_by(|a, b| a.rule.cmp(&b.rule));
        (roles, failures)
    }

    /// Reconciles every community concurrently.
    async fn reconcile(
        &self,
        user_id: &UserId,
        roles: &RoleSet,
        communities: &BTreeSet<CommunityId>,
    ) -> Vec<CommunityOutcome> {
        let roles = Arc::new(roles.clone());
        let mut tasks = ParallelTaskSet::new(self.config.max_parallelism);
        let mut ids = HashMap::new();
        for community in communities {
            let Some(config) = self.roles.guilds.get(community).cloned() else {
                continue;
            };
            let platform = Arc::clone(&self.collaborators.platform);
            let user_id = user_id.clone();
            let roles = Arc::clone(&roles);
            let remove = self.config.remove_unwarranted_roles;
            let id = tasks.spawn(async move {
                reconcile_community(platform.as_ref(), &config, &user_id, &roles, remove).await
            });
            ids.insert(id, community.clone());
        }

        let mut outcomes: Vec<CommunityOutcome> = tasks
            .join_all()
            .await
            .into_iter()
            .filter_map(|output| match output {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    let community = ids.get(&err.id()).cloned()?;
                    warn!(community_id = %community, error = %err, "reconciliation branch aborted");
                    Some(CommunityOutcome::aborted(community, err.to_string()))
                }
            })
            .collect();
        outcomes.sort_by(|a, b| a.community_id.cmp(&b.community_id));
        outcomes
    }

    /// Builds the notice for a community that was not fully reconciled.
    fn reconciliation_notice(&self, outcome: &CommunityOutcome) -> Notice {
        let community = self
            .roles
            .guilds
            .get(&outcome.community_id)
            .map_or_else(|| outcome.community_id.to_string(), GuildRoleConfig::label);
        Notice::ReconciliationFailed {
            community,
            failed_role_ids: outcome
                .failures
                .iter()
                .filter_map(|failure| failure.role_id.clone())
                .collect(),
        }
    }

    /// Sends a notice; failures are logged and swallowed.
    async fn send_notice(&self, user_id: &UserId, notice: &Notice) {
        if let Err(err) = self.collaborators.notifier.notify(user_id, notice).await {
            warn!(user_id = %user_id, error = %err, "notification failed");
        }
    }
}

// ============================================================================
// SECTION: Branches
// ============================================================================

/// Logs a stage transition.
fn log_stage(user_id: &UserId, stage: ResolutionStage) {
    debug!(user_id = %user_id, stage = stage.as_str(), "resolution stage");
}

/// Runs one rule: cache lookup, execution on miss, cache fill on success.
async fn run_rule(rule: &Rule, run: RuleRun) -> RuleBranch {
    let user_id = run.ctx.user_id.clone();
    let use_cache = run.cache.is_enabled() && rule.is_cacheable();

    if use_cache && !run.cache_degraded.load(Ordering::SeqCst) {
        match run.cache.try_get(rule, &user_id).await {
            Ok(CacheResult::Hit(roles)) => {
                debug!(rule = %rule.name(), user_id = %user_id, "rule cache hit");
                return RuleBranch {
                    rule: rule.name().clone(),
                    roles,
                    failure: None,
                };
            }
            Ok(CacheResult::NotFound) => {}
            Err(err) => {
                warn!(rule = %rule.name(), error = %err, "rule cache read failed");
                run.cache_degraded.store(true, Ordering::SeqCst);
            }
        }
    }

    let identity = run.identity.as_deref();
    let execution = executor::execute(rule, run.ctx.clone(), identity);
    let result = match run.timeout {
        Some(timeout) => tokio::time::timeout(timeout, execution).await.unwrap_or_else(|_| {
            RuleResult::Failure(PredicateError::TimedOut {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }),
        None => execution.await,
    };

    match result {
        RuleResult::Success(roles) => {
            // A strong rule evaluated without identity says nothing durable.
            let cacheable = !(rule.is_strong() && identity.is_none());
            if use_cache && cacheable && !run.cache_degraded.load(Ordering::SeqCst) {
                if let Err(err) = run.cache.put(rule, &user_id, &roles).await {
                    warn!(rule = %rule.name(), error = %err, "rule cache write failed");
                    run.cache_degraded.store(true, Ordering::SeqCst);
                }
            }
            RuleBranch {
                rule: rule.name().clone(),
                roles,
                failure: None,
            }
        }
        RuleResult::Failure(error) => {
            warn!(rule = %rule.name(), user_id = %user_id, error = %error, "rule failed");
            RuleBranch {
                rule: rule.name().clone(),
                roles: RoleSet::new(),
                failure: Some(error),
            }
        }
    }
}

/// Applies the desired roles to one community.
async fn reconcile_community(
    platform: &dyn ChatPlatformClient,
    config: &GuildRoleConfig,
    user_id: &UserId,
    roles: &RoleSet,
    remove_unwarranted: bool,
) -> CommunityOutcome {
    let community = &config.community_id;
    let desired = config.map_roles(roles);
    let mut granted = BTreeSet::new();
    let mut revoked = BTreeSet::new();
    let mut failures = Vec::new();

    let held: Option<BTreeSet<RoleId>> = if remove_unwarranted {
        match platform.member_roles(community, user_id).await {
            Ok(held) => Some(held),
            Err(err) => {
                failures.push(RoleOperationFailure {
                    action: RoleAction::ListRoles,
                    role_id: None,
                    error: err.to_string(),
                });
                None
            }
        }
    } else {
        None
    };

    for role_id in &desired {
        if held.as_ref().is_some_and(|held| held.contains(role_id)) {
            continue;
        }
        match platform.grant_role(community, user_id, role_id).await {
            Ok(()) => {
                granted.insert(role_id.clone());
            }
            Err(err) => failures.push(RoleOperationFailure {
                action: RoleAction::Grant,
                role_id: Some(role_id.clone()),
                error: err.to_string(),
            }),
        }
    }

    if let Some(held) = held {
        let managed = config.managed_role_ids();
        for role_id in held.intersection(&managed) {
            if desired.contains(role_id) || config.is_sticky(role_id) {
                continue;
            }
            match platform.revoke_role(community, user_id, role_id).await {
                Ok(()) => {
                    revoked.insert(role_id.clone());
                }
                Err(err) => failures.push(RoleOperationFailure {
                    action: RoleAction::Revoke,
                    role_id: Some(role_id.clone()),
                    error: err.to_string(),
                }),
            }
        }
    }

    CommunityOutcome::from_operations(community.clone(), granted, revoked, failures)
}
