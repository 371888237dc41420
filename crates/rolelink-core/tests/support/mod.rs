// crates/rolelink-core/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Fake collaborators and fixtures for role manager tests.
// Purpose: Share recording fakes across role manager integration tests.
// Dependencies: rolelink-core, async-trait
// ============================================================================
//! ## Overview
//! Recording fakes for every collaborator interface plus small fixtures for
//! users, rules, and guild configurations.

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Each test binary uses a subset of the shared fakes."
)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use rolelink_core::CacheBackend;
use rolelink_core::CacheError;
use rolelink_core::ChatPlatformClient;
use rolelink_core::Collaborators;
use rolelink_core::CommunityId;
use rolelink_core::IdentityAccessor;
use rolelink_core::IdentityError;
use rolelink_core::JoinDecision;
use rolelink_core::Membership;
use rolelink_core::Notice;
use rolelink_core::NotificationSender;
use rolelink_core::NotifyError;
use rolelink_core::PermissionChecker;
use rolelink_core::PermissionError;
use rolelink_core::PlatformError;
use rolelink_core::PlatformUserInfo;
use rolelink_core::RegisteredUser;
use rolelink_core::RoleDeclaration;
use rolelink_core::RoleDeclarations;
use rolelink_core::RoleId;
use rolelink_core::RoleName;
use rolelink_core::RoleSet;
use rolelink_core::Rule;
use rolelink_core::RuleContext;
use rolelink_core::RuleName;
use rolelink_core::SyncRequest;
use rolelink_core::UserId;
use rolelink_core::role_set;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds a registered user.
pub fn user(id: &str, identity_opted_in: bool) -> RegisteredUser {
    RegisteredUser {
        user_id: UserId::new(id),
        identity_opted_in,
    }
}

/// Builds platform attributes.
pub fn info(display_name: &str) -> PlatformUserInfo {
    PlatformUserInfo {
        display_name: display_name.to_string(),
        discriminator: "0001".to_string(),
    }
}

/// Builds a rule context for a user id.
pub fn ctx(user_id: &str) -> RuleContext {
    RuleContext::new(UserId::new(user_id), "Someone", "0001")
}

/// Builds a sync request with the user present in every listed community.
pub fn request(user: RegisteredUser, communities: &[&str]) -> SyncRequest {
    SyncRequest {
        user,
        info: info("Someone"),
        memberships: communities.iter().map(|id| Membership::present(*id)).collect(),
        notify_on_failure: true,
    }
}

/// Weak rule always returning the given roles, counting its invocations.
pub fn counting_weak_rule(
    name: &str,
    cache: Option<Duration>,
    roles: &[&str],
    calls: Arc<AtomicUsize>,
) -> Rule {
    let roles: RoleSet = role_set(roles.iter().copied());
    Rule::weak(name, cache, move |_ctx| {
        let roles = roles.clone();
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(roles)
        }
    })
}

/// Weak rule always returning the given roles.
pub fn constant_weak_rule(name: &str, roles: &[&str]) -> Rule {
    counting_weak_rule(name, None, roles, Arc::new(AtomicUsize::new(0)))
}

// ============================================================================
// SECTION: Permission Checker
// ============================================================================

/// Permission checker returning a fixed answer.
pub struct FakePermissions {
    /// Answer returned for every user.
    answer: Result<JoinDecision, String>,
}

impl FakePermissions {
    /// Allows every user.
    pub fn allow() -> Self {
        Self {
            answer: Ok(JoinDecision::Allowed),
        }
    }

    /// Refuses every user with a reason.
    pub fn deny(reason: &str) -> Self {
        Self {
            answer: Ok(JoinDecision::Disallowed {
                reason: reason.to_string(),
            }),
        }
    }

    /// Fails every check.
    pub fn broken(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl PermissionChecker for FakePermissions {
    async fn can_user_join(&self, _user: &RegisteredUser) -> Result<JoinDecision, PermissionError> {
        self.answer.clone().map_err(PermissionError::CheckFailed)
    }
}

// ============================================================================
// SECTION: Identity Accessor
// ============================================================================

/// Recorded identity access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCall {
    /// User whose identity was read.
    pub user_id: UserId,
    /// Whether the access was automated.
    pub automated: bool,
    /// Audit justification.
    pub justification: String,
}

/// Identity accessor returning a fixed identity and recording every call.
pub struct FakeIdentity {
    /// Identity returned, or `None` to fail.
    identity: Option<String>,
    /// Recorded calls.
    calls: Mutex<Vec<IdentityCall>>,
}

impl FakeIdentity {
    /// Accessor returning an identity.
    pub fn with_identity(identity: &str) -> Self {
        Self {
            identity: Some(identity.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Accessor whose every call fails.
    pub fn failing() -> Self {
        Self {
            identity: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns recorded calls.
    pub fn calls(&self) -> Vec<IdentityCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityAccessor for FakeIdentity {
    async fn disclose_identity(
        &self,
        user: &RegisteredUser,
        automated: bool,
        justification: &str,
    ) -> Result<String, IdentityError> {
        self.calls.lock().unwrap().push(IdentityCall {
            user_id: user.user_id.clone(),
            automated,
            justification: justification.to_string(),
        });
        self.identity
            .clone()
            .ok_or_else(|| IdentityError::AccessFailed("identity store offline".to_string()))
    }
}

// ============================================================================
// SECTION: Chat Platform
// ============================================================================

/// Recorded platform mutation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PlatformCall {
    /// Role granted.
    Grant(CommunityId, RoleId),
    /// Role revoked.
    Revoke(CommunityId, RoleId),
}

/// In-memory chat platform.
#[derive(Default)]
pub struct FakePlatform {
    /// Members per community.
    members: BTreeMap<CommunityId, BTreeSet<UserId>>,
    /// Roles currently held per community.
    held: Mutex<BTreeMap<CommunityId, BTreeSet<RoleId>>>,
    /// Role ids whose grant or revocation fails.
    failing_roles: BTreeSet<RoleId>,
    /// Communities where every call fails.
    failing_communities: BTreeSet<CommunityId>,
    /// Recorded mutations.
    calls: Mutex<Vec<PlatformCall>>,
}

impl FakePlatform {
    /// Creates an empty platform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member to a community.
    pub fn with_member(mut self, community: &str, user_id: &str) -> Self {
        self.members.entry(CommunityId::new(community)).or_default().insert(UserId::new(user_id));
        self
    }

    /// Marks a role as already held on a community.
    pub fn with_held_role(self, community: &str, role_id: &str) -> Self {
        self.held
            .lock()
            .unwrap()
            .entry(CommunityId::new(community))
            .or_default()
            .insert(RoleId::new(role_id));
        self
    }

    /// Makes every operation on a role fail.
    pub fn with_failing_role(mut self, role_id: &str) -> Self {
        self.failing_roles.insert(RoleId::new(role_id));
        self
    }

    /// Makes every operation on a community fail.
    pub fn with_failing_community(mut self, community: &str) -> Self {
        self.failing_communities.insert(CommunityId::new(community));
        self
    }

    /// Returns recorded mutations, sorted.
    pub fn calls(&self) -> Vec<PlatformCall> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }

    /// Returns roles held on a community.
    pub fn held(&self, community: &str) -> BTreeSet<RoleId> {
        self.held.lock().unwrap().get(&CommunityId::new(community)).cloned().unwrap_or_default()
    }

    /// Fails when the community or role is configured to fail.
    fn check(
        &self,
        community: &CommunityId,
        role_id: Option<&RoleId>,
    ) -> Result<(), PlatformError> {
        if self.failing_communities.contains(community) {
            return Err(PlatformError::Unavailable(format!("{community} offline")));
        }
        if role_id.is_some_and(|role_id| self.failing_roles.contains(role_id)) {
            return Err(PlatformError::Rejected("missing permissions".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPlatformClient for FakePlatform {
    async fn list_membership(
        &self,
        community_id: &CommunityId,
    ) -> Result<BTreeSet<UserId>, PlatformError> {
        self.check(community_id, None)?;
        Ok(self.members.get(community_id).cloned().unwrap_or_default())
    }

    async fn member_roles(
        &self,
        community_id: &CommunityId,
        _user_id: &UserId,
    ) -> Result<BTreeSet<RoleId>, PlatformError> {
        self.check(community_id, None)?;
        Ok(self.held.lock().unwrap().get(community_id).cloned().unwrap_or_default())
    }

    async fn grant_role(
        &self,
        community_id: &CommunityId,
        _user_id: &UserId,
        role_id: &RoleId,
    ) -> Result<(), PlatformError> {
        self.check(community_id, Some(role_id))?;
        self.held.lock().unwrap().entry(community_id.clone()).or_default().insert(role_id.clone());
        self.calls.lock().unwrap().push(PlatformCall::Grant(community_id.clone(), role_id.clone()));
        Ok(())
    }

    async fn revoke_role(
        &self,
        community_id: &CommunityId,
        _user_id: &UserId,
        role_id: &RoleId,
    ) -> Result<(), PlatformError> {
        self.check(community_id, Some(role_id))?;
        if let Some(held) = self.held.lock().unwrap().get_mut(community_id) {
            held.remove(role_id);
        }
        let call = PlatformCall::Revoke(community_id.clone(), role_id.clone());
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

// ============================================================================
// SECTION: Notifications
// ============================================================================

/// Notification sender recording every notice.
#[derive(Default)]
pub struct RecordingNotifier {
    /// Recorded notices.
    notices: Mutex<Vec<(UserId, Notice)>>,
}

impl RecordingNotifier {
    /// Returns recorded notices.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().iter().map(|(_, notice)| notice.clone()).collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn notify(&self, user_id: &UserId, notice: &Notice) -> Result<(), NotifyError> {
        self.notices.lock().unwrap().push((user_id.clone(), notice.clone()));
        Ok(())
    }
}

// ============================================================================
// SECTION: Cache Backend
// ============================================================================

/// Cache backend whose every call fails.
#[derive(Default)]
pub struct BrokenCacheBackend {
    /// Number of calls received.
    calls: AtomicUsize,
}

impl BrokenCacheBackend {
    /// Returns the number of calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Records a call and fails it.
    fn fail<T>(&self) -> Result<T, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl CacheBackend for BrokenCacheBackend {
    async fn get_members(&self, _key: &str) -> Result<Option<Vec<String>>, CacheError> {
        self.fail()
    }

    async fn replace_members(
        &self,
        _key: &str,
        _members: Vec<String>,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        self.fail()
    }

    async fn delete(&self, _keys: &[String]) -> Result<(), CacheError> {
        self.fail()
    }

    async fn index_add(&self, _index_key: &str, _member: &str) -> Result<(), CacheError> {
        self.fail()
    }

    async fn index_drain(&self, _index_key: &str) -> Result<Vec<String>, CacheError> {
        self.fail()
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Fakes wired into a [`Collaborators`] bundle.
pub struct Harness {
    /// Identity fake.
    pub identity: Arc<FakeIdentity>,
    /// Platform fake.
    pub platform: Arc<FakePlatform>,
    /// Notification recorder.
    pub notifier: Arc<RecordingNotifier>,
    /// Bundle handed to the role manager.
    pub collaborators: Collaborators,
}

impl Harness {
    /// Wires fakes together.
    pub fn new(
        permissions: FakePermissions,
        identity: FakeIdentity,
        platform: FakePlatform,
    ) -> Self {
        let identity = Arc::new(identity);
        let platform = Arc::new(platform);
        let notifier = Arc::new(RecordingNotifier::default());
        let collaborators = Collaborators {
            permissions: Arc::new(permissions),
            identity: Arc::clone(&identity) as Arc<dyn IdentityAccessor>,
            platform: Arc::clone(&platform) as Arc<dyn ChatPlatformClient>,
            notifier: Arc::clone(&notifier) as Arc<dyn NotificationSender>,
        };
        Self {
            identity,
            platform,
            notifier,
            collaborators,
        }
    }
}

// ============================================================================
// SECTION: Declarations
// ============================================================================

/// Builds a declaration table from `(role, rule)` pairs.
pub fn declarations(pairs: &[(&str, &str)]) -> RoleDeclarations {
    pairs
        .iter()
        .map(|(role, rule)| RoleDeclaration {
            name: RoleName::new(*role),
            display_name: None,
            rule: RuleName::new(*rule),
        })
        .collect()
}
