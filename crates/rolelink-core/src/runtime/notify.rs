// crates/rolelink-core/src/runtime/notify.rs
// ============================================================================
// Module: RoleLink Log Notification Sender
// Description: Notification sender writing one JSON record per notice.
// Purpose: Provide an audit-channel sender when no chat DM path exists.
// Dependencies: crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! [`LogNotificationSender`] serializes each notice with the target user and
//! its rendered message as a JSON line into any writer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde_json::json;

use crate::core::UserId;
use crate::interfaces::Notice;
use crate::interfaces::NotificationSender;
use crate::interfaces::NotifyError;

// ============================================================================
// SECTION: Log Sender
// ============================================================================

/// Notification sender that appends JSON lines to a writer.
pub struct LogNotificationSender<W: Write + Send> {
    /// Output writer for notice records.
    writer: Mutex<W>,
}

impl<W: Write + Send> LogNotificationSender<W> {
    /// Creates a sender over a writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sender and returns the writer.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the writer mutex is poisoned.
    pub fn into_inner(self) -> Result<W, NotifyError> {
        self.writer
            .into_inner()
            .map_err(|_| NotifyError::DeliveryFailed("notice writer mutex poisoned".to_string()))
    }
}

#[async_trait]
impl<W: Write + Send> NotificationSender for LogNotificationSender<W> {
    async fn notify(&self, user_id: &UserId, notice: &Notice) -> Result<(), NotifyError> {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_millis())
            .unwrap_or_default();
        let record = json!({
            "event": "rolelink_notice",
            "timestamp_ms": timestamp_ms,
            "user_id": user_id,
            "notice": notice,
            "message": notice.message(),
        });
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| NotifyError::DeliveryFailed("notice writer mutex poisoned".to_string()))?;
        serde_json::to_writer(&mut *guard, &record)
            .map_err(|err| NotifyError::DeliveryFailed(err.to_string()))?;
        guard.write_all(b"\n").map_err(|err| NotifyError::DeliveryFailed(err.to_string()))?;
        drop(guard);
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
