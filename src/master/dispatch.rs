//! Event dispatcher (spec §4.D "Event dispatcher"). Resolves an inbound
//! event's monitor to its contacts, each contact to its notification
//! plugin, and fans the notification out concurrently — failures at any
//! resolution step are logged and skipped, never fatal to the ingest
//! (spec §7 "Notification failures are logged and swallowed").

use std::sync::Arc;

use crate::error::AmonError;
use crate::master::state::AppState;
use crate::model::Monitor;
use crate::plugins::notification::Notification;
use crate::wire::Event;

/// Renders the human-facing message a notification plugin receives,
/// preferring the event's own `data.message` (what a real probe
/// implementation supplies) and falling back to a generic line for
/// synthetic events that skip it (spec §8 scenario 6's fake fault).
fn render_message(event: &Event) -> String {
    event
        .data
        .get("message")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "{} {} on monitor {} ({})",
                if event.clear { "cleared" } else { "fired" },
                event.probe.name,
                event.monitor,
                event.event_type
            )
        })
}

/// Runs the four-step dispatch algorithm from spec §4.D. Always returns
/// `Ok(())` once the monitor/contact/plugin resolution has been attempted —
/// "ingestion completed" is the only thing the caller of `POST /events`
/// is told about (spec §4.D step 5).
pub async fn dispatch(state: &AppState, event: &Event) {
    let monitor = match state.get_monitor(&event.user, &event.monitor).await {
        Ok(m) => m,
        Err(AmonError::ResourceNotFound(_)) => {
            tracing::warn!(
                user = %event.user,
                monitor = %event.monitor,
                "dispatch: unknown monitor, dropping event"
            );
            return;
        }
        Err(e) => {
            tracing::warn!(user = %event.user, monitor = %event.monitor, error = %e, "dispatch: failed to resolve monitor");
            return;
        }
    };

    let message = render_message(event);
    let mut notifications = Vec::new();
    for contact_name in resolve_contacts(state, &monitor).await {
        let (contact, plugin) = contact_name;
        notifications.push(deliver(plugin, contact, message.clone(), event.clone()));
    }

    let results = futures::future::join_all(notifications).await;
    let failures = results.iter().filter(|r| r.is_err()).count();
    if failures > 0 {
        tracing::warn!(
            user = %event.user,
            monitor = %event.monitor,
            failures,
            total = results.len(),
            "dispatch: some notifications failed (swallowed per spec)"
        );
    }
}

/// Resolves `monitor.contacts` to `(Contact, NotificationPlugin)` pairs,
/// skipping (with a warning, not an error) any contact name that doesn't
/// resolve to a Contact and any medium with no registered plugin (spec §4.D
/// steps 2-3, spec §8 P6).
async fn resolve_contacts(
    state: &AppState,
    monitor: &Monitor,
) -> Vec<(crate::model::Contact, Arc<dyn crate::plugins::NotificationPlugin>)> {
    let mut resolved = Vec::new();
    for name in &monitor.contacts {
        let contact = match state.get_contact(&monitor.user, name).await {
            Ok(c) => c,
            Err(_) => {
                tracing::warn!(user = %monitor.user, monitor = %monitor.name, contact = %name, "dispatch: unresolved contact, skipping");
                continue;
            }
        };
        let plugin = match state.notifications.get(&contact.medium) {
            Some(p) => p,
            None => {
                tracing::warn!(user = %monitor.user, contact = %name, medium = %contact.medium, "dispatch: no plugin for medium, skipping");
                continue;
            }
        };
        resolved.push((contact, plugin));
    }
    resolved
}

async fn deliver(
    plugin: Arc<dyn crate::plugins::NotificationPlugin>,
    contact: crate::model::Contact,
    message: String,
    event: Event,
) -> Result<(), String> {
    let event_json = serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
    let result = plugin
        .notify(Notification {
            recipient: contact.data.clone(),
            message,
            event: event_json,
        })
        .await;
    if let Err(e) = &result {
        tracing::warn!(contact = %contact.name, medium = %contact.medium, error = %e, "notification delivery failed");
    }
    result
}

/// Synthesizes the `type: "fake"` event for `POST
/// /pub/:login/monitors/:name?action=fakefault` (spec §4.D, §8 scenario 6).
/// `clear` defaults to `false`; the probe reference names a nonexistent
/// probe since no real probe is involved.
pub fn fake_fault_event(user: &str, monitor: &str, clear: bool) -> Event {
    Event {
        v: crate::wire::EVENT_WIRE_VERSION,
        uuid: uuid::Uuid::new_v4().to_string(),
        event_type: "fake".to_string(),
        user: user.to_string(),
        monitor: monitor.to_string(),
        time: chrono::Utc::now().timestamp_millis(),
        clear,
        data: serde_json::json!({ "message": format!("synthetic fake fault for monitor {monitor}") }),
        probe: crate::wire::EventProbeRef {
            user: user.to_string(),
            monitor: monitor.to_string(),
            name: "fakefault".to_string(),
            probe_type: "fake".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::FakeAccountService;
    use crate::config::{CacheConfig, MasterConfig, UfdsConfig};
    use crate::config::{AccountsConfig, MapiConfig};
    use crate::directory::MemoryDirectory;
    use crate::mapi::FakeMachineInfoApi;
    use crate::model::contact::ContactPublicForm;
    use crate::model::monitor::MonitorPublicForm;
    use crate::model::{Contact, Monitor};
    use crate::plugins::notification::LogNotificationPlugin;
    use crate::plugins::{NotificationRegistry, ProbeTypeRegistry};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_config() -> MasterConfig {
        MasterConfig {
            port: 0,
            ufds: UfdsConfig {
                url: "ldap://unused".to_string(),
                root_dn: "cn=root".to_string(),
                password: String::new(),
            },
            mapi: MapiConfig {
                url: "http://unused".to_string(),
            },
            accounts: AccountsConfig {
                url: "http://unused".to_string(),
            },
            account_cache: CacheConfig {
                size: 16,
                expiry: Duration::from_secs(60),
            },
            probe_cache: CacheConfig {
                size: 16,
                expiry: Duration::from_secs(60),
            },
        }
    }

    async fn state_with_log_plugin() -> (AppState, Arc<LogNotificationPlugin>) {
        let directory = Arc::new(MemoryDirectory::new());
        let mapi = Arc::new(FakeMachineInfoApi::default());
        let accounts = Arc::new(FakeAccountService::default());
        let mut notifications = NotificationRegistry::new();
        let log_plugin = Arc::new(LogNotificationPlugin::new());
        notifications.register("log", log_plugin.clone());
        let state = AppState::new(
            &test_config(),
            directory,
            mapi,
            accounts,
            Arc::new(ProbeTypeRegistry::new()),
            Arc::new(notifications),
        );
        (state, log_plugin)
    }

    #[tokio::test]
    async fn unknown_monitor_drops_event_without_panicking() {
        let (state, _) = state_with_log_plugin().await;
        let event = fake_fault_event("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa", "nonexistent", false);
        dispatch(&state, &event).await;
    }

    #[tokio::test]
    async fn p6_invalid_contact_does_not_block_valid_one() {
        let (state, log_plugin) = state_with_log_plugin().await;
        let user = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";

        let good_contact = Contact::from_public(ContactPublicForm {
            name: "ops".to_string(),
            user: user.to_string(),
            medium: "log".to_string(),
            data: "ops@example.com".to_string(),
        })
        .unwrap();
        state.put_contact(&good_contact).await.unwrap();

        let monitor = Monitor::from_public(MonitorPublicForm {
            name: "whistle".to_string(),
            user: user.to_string(),
            contacts: vec!["ops".to_string(), "does-not-exist".to_string()],
        })
        .unwrap();
        state.put_monitor(&monitor).await.unwrap();

        let event = fake_fault_event(user, "whistle", false);
        dispatch(&state, &event).await;

        assert_eq!(log_plugin.deliveries().len(), 1);
        assert_eq!(log_plugin.deliveries()[0].recipient, "ops@example.com");
    }
}
