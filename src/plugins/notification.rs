//! The notification-plugin contract (spec §4.D): `newInstance(config) ->
//! { notify(event, recipient, message, cb) }`. Plugins are stateful per
//! Master process, instantiated once at startup from configuration, and
//! must tolerate concurrent `notify` calls (spec §5) since event dispatch
//! fans out to every resolved contact concurrently.
//!
//! Concrete notification media (email, SMS, XMPP, …) are out of scope per
//! spec §1; this module defines the contract plus a `LogNotificationPlugin`
//! that records deliveries rather than dialing an external service — the
//! same role the teacher's `DiscordAdapter` plays for a concrete medium,
//! just pointed at a deployment-neutral sink so the dispatcher and its
//! tests don't depend on any real external webhook.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient: String,
    pub message: String,
    pub event: Value,
}

#[async_trait]
pub trait NotificationPlugin: Send + Sync {
    /// Delivers one event to one contact. Failure is logged by the
    /// dispatcher and never surfaced to the event's caller (spec §4.D step 5).
    async fn notify(&self, notification: Notification) -> Result<(), String>;
}

#[derive(Default)]
pub struct NotificationRegistry {
    plugins: HashMap<String, Arc<dyn NotificationPlugin>>,
}

impl NotificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, medium: impl Into<String>, plugin: Arc<dyn NotificationPlugin>) {
        self.plugins.insert(medium.into(), plugin);
    }

    pub fn get(&self, medium: &str) -> Option<Arc<dyn NotificationPlugin>> {
        self.plugins.get(medium).cloned()
    }
}

/// A deployment-neutral notification plugin that records every delivery it
/// was asked to make instead of dialing a real medium. Useful as the
/// default registered for `medium = "log"` and in tests (spec §8 P6,
/// scenario 6's fake-fault dispatch).
pub struct LogNotificationPlugin {
    deliveries: Mutex<Vec<Notification>>,
}

impl Default for LogNotificationPlugin {
    fn default() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
        }
    }
}

impl LogNotificationPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Notification> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPlugin for LogNotificationPlugin {
    async fn notify(&self, notification: Notification) -> Result<(), String> {
        tracing::info!(
            recipient = %notification.recipient,
            message = %notification.message,
            "notification delivered"
        );
        self.deliveries.lock().unwrap().push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_plugin_records_deliveries() {
        let plugin = LogNotificationPlugin::new();
        plugin
            .notify(Notification {
                recipient: "ops@example.com".to_string(),
                message: "probe fired".to_string(),
                event: serde_json::json!({"type": "probe"}),
            })
            .await
            .unwrap();
        assert_eq!(plugin.deliveries().len(), 1);
    }
}
