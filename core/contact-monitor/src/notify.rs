//! Local-notification capability.

use contact_monitor_protocol::NotificationRequest;
use tracing::info;

use crate::error::Result;

/// Schedules a local notification on the host. Fire-and-forget: the engine
/// never waits on delivery, and a scheduling failure only costs one
/// notification.
pub trait NotificationDispatcher: Send + Sync {
    fn schedule(&self, request: &NotificationRequest) -> Result<()>;
}

/// Dispatcher for hosts without a notification center; logs the request
/// instead of scheduling it.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationDispatcher;

impl NotificationDispatcher for LogNotificationDispatcher {
    fn schedule(&self, request: &NotificationRequest) -> Result<()> {
        info!(
            title = %request.title,
            body = %request.body,
            "Notification scheduled (log dispatcher)"
        );
        Ok(())
    }
}
