//! Routes a running probe instance's emitted events back through the
//! relay to Master (spec §4.E "events they emit are routed back through
//! the relay"). One instance per running probe, capturing its identity so
//! `Event.probe` is always correct without threading it through
//! `ProbeInstance::run_once`'s signature.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::client::RelayClient;
use crate::plugins::probe_type::{EventEmitter, ProbeContext};
use crate::wire::{Event, EventProbeRef, EVENT_WIRE_VERSION};

pub struct RelayEmitter {
    client: Arc<RelayClient>,
    context: ProbeContext,
    probe_type: String,
}

impl RelayEmitter {
    pub fn new(client: Arc<RelayClient>, context: ProbeContext, probe_type: String) -> Self {
        Self {
            client,
            context,
            probe_type,
        }
    }
}

#[async_trait]
impl EventEmitter for RelayEmitter {
    async fn emit(&self, data: Value, clear: bool) {
        let event = Event {
            v: EVENT_WIRE_VERSION,
            uuid: uuid::Uuid::new_v4().to_string(),
            event_type: "probe".to_string(),
            user: self.context.user.clone(),
            monitor: self.context.monitor.clone(),
            time: chrono::Utc::now().timestamp_millis(),
            clear,
            data,
            probe: EventProbeRef {
                user: self.context.user.clone(),
                monitor: self.context.monitor.clone(),
                name: self.context.name.clone(),
                probe_type: self.probe_type.clone(),
            },
        };
        // Failure here is the agent's own best-effort hop; the relay
        // applies the real bounded-retry policy on its leg to Master
        // (spec §4.E), so a dropped send just waits for the probe's next
        // run_once tick to try again.
        if let Err(e) = self.client.post_event(&event).await {
            tracing::warn!(probe = %self.context.name, error = %e, "failed to emit event to relay");
        }
    }
}
