//! Notice suppression tests for rolelink-config.
// crates/rolelink-config/tests/config_notices.rs
// =============================================================================
// Module: Config Notice Tests
// Description: Validate that `[sync] notify_on_failure` reaches the manager.
// Purpose: Ensure a loaded config can silence every user notice.
// Dependencies: rolelink-config, rolelink-core, async-trait, tempfile, tokio
// =============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use rolelink_config::RoleLinkConfig;
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
use rolelink_core::PredicateError;
use rolelink_core::RegisteredUser;
use rolelink_core::RoleId;
use rolelink_core::RoleManager;
use rolelink_core::Rule;
use rolelink_core::Rulebook;
use rolelink_core::RulebookHandle;
use rolelink_core::SyncRequest;
use rolelink_core::UserId;

mod common;

type TestResult = Result<(), String>;

// ============================================================================
// SECTION: Fakes
// ============================================================================

/// Permission checker admitting everyone.
struct AllowAll;

#[async_trait]
impl PermissionChecker for AllowAll {
    async fn can_user_join(&self, _user: &RegisteredUser) -> Result<JoinDecision, PermissionError> {
        Ok(JoinDecision::Allowed)
    }
}

/// Identity accessor with no stored identities.
struct NoIdentity;

#[async_trait]
impl IdentityAccessor for NoIdentity {
    async fn disclose_identity(
        &self,
        _user: &RegisteredUser,
        _automated: bool,
        _justification: &str,
    ) -> Result<String, IdentityError> {
        Err(IdentityError::NotAvailable("none stored".to_string()))
    }
}

/// Platform rejecting every role grant.
struct RejectingPlatform;

#[async_trait]
impl ChatPlatformClient for RejectingPlatform {
    async fn list_membership(
        &self,
        _community_id: &CommunityId,
    ) -> Result<BTreeSet<UserId>, PlatformError> {
        Ok(BTreeSet::new())
    }

    async fn member_roles(
        &self,
        _community_id: &CommunityId,
        _user_id: &UserId,
    ) -> Result<BTreeSet<RoleId>, PlatformError> {
        Ok(BTreeSet::new())
    }

    async fn grant_role(
        &self,
        _community_id: &CommunityId,
        _user_id: &UserId,
        _role_id: &RoleId,
    ) -> Result<(), PlatformError> {
        Err(PlatformError::Rejected("missing permission".to_string()))
    }

    async fn revoke_role(
        &self,
        _community_id: &CommunityId,
        _user_id: &UserId,
        _role_id: &RoleId,
    ) -> Result<(), PlatformError> {
        Ok(())
    }
}

/// Notification sender recording every notice.
#[derive(Default)]
struct RecordingNotifier {
    /// Delivered notices.
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    /// Returns the number of delivered notices.
    fn count(&self) -> Result<usize, String> {
        self.notices.lock().map(|notices| notices.len()).map_err(|err| err.to_string())
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn notify(&self, _user_id: &UserId, notice: &Notice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .map_err(|err| NotifyError::DeliveryFailed(err.to_string()))?
            .push(notice.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Config with one guild whose `member` role comes from a failing rule and
/// whose `_known` role cannot be granted.
fn config_toml(notify_on_failure: bool) -> String {
    format!(
        r#"
[cache]
backend = "none"

[sync]
notify_on_failure = {notify_on_failure}

[[roles]]
name = "member"
rule = "Broken"

[[guilds]]
id = "1000"
[guilds.roles]
member = "111"
_known = "110"
"#
    )
}

/// Loads the config from disk, resolves one user, and counts notices.
async fn notices_sent(notify_on_failure: bool) -> Result<usize, String> {
    let (_dir, path) = common::write_config(config_toml(notify_on_failure).as_bytes())
        .map_err(|err| err.to_string())?;
    let config = RoleLinkConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    let rulebook = Rulebook::builder()
        .rule(Rule::weak("Broken", None, |_ctx| async {
            Err::<_, PredicateError>(PredicateError::Failed("upstream down".to_string()))
        }))
        .build()
        .map_err(|err| err.to_string())?;
    let notifier = Arc::new(RecordingNotifier::default());
    let collaborators = Collaborators {
        permissions: Arc::new(AllowAll),
        identity: Arc::new(NoIdentity),
        platform: Arc::new(RejectingPlatform),
        notifier: Arc::clone(&notifier) as Arc<dyn NotificationSender>,
    };
    let manager = RoleManager::new(
        RulebookHandle::new(rulebook),
        config.role_configuration(),
        config.build_cache().map_err(|err| err.to_string())?,
        collaborators,
        config.manager_config(),
    );
    let request = SyncRequest {
        user: RegisteredUser {
            user_id: UserId::new("u1"),
            identity_opted_in: false,
        },
        info: PlatformUserInfo {
            display_name: "Someone".to_string(),
            discriminator: "0001".to_string(),
        },
        memberships: vec![Membership::present("1000")],
        notify_on_failure: true,
    };

    manager.resolve_and_sync(&request).await;
    notifier.count()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// With notices enabled, the rule failure and the failed grant are reported.
#[tokio::test]
async fn notices_sent_by_default() -> TestResult {
    let sent = notices_sent(true).await?;
    if sent != 2 {
        return Err(format!("expected 2 notices, got {sent}"));
    }
    Ok(())
}

/// `notify_on_failure = false` silences notices even when the request asks.
#[tokio::test]
async fn disabled_notices_are_suppressed() -> TestResult {
    let sent = notices_sent(false).await?;
    if sent != 0 {
        return Err(format!("expected no notices, got {sent}"));
    }
    Ok(())
}
