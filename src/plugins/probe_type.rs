//! The probe-type plugin contract (spec §4.B, §4.E): `type -> { newInstance,
//! validateConfig, runInGlobal }`. Concrete probe-type *logic* (log-scan
//! regex matching, etc.) is out of scope per spec §1 — this module defines
//! only the contract and the registry that holds whichever implementations
//! a deployment wires up. The agent binary registers one illustrative
//! implementation (`machine-up`, see `crate::agent::probes::machine_up`) so
//! the contract has at least one real conformer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AmonError;

/// A running instance of a probe-type implementation, as handed back by
/// `ProbeType::new_instance`. The agent's reconciler (spec §4.E state
/// machine) drives one of these per `Running` probe.
#[async_trait]
pub trait ProbeInstance: Send + Sync {
    /// Runs the check to completion, firing zero or more events through the
    /// given emitter. Implementations decide their own internal polling
    /// cadence; `run_once` is invoked by the agent's scheduler on that cadence.
    async fn run_once(&self, emit: &dyn EventEmitter) -> Result<(), AmonError>;

    /// Tears down any held resources (sockets, file watches, …) on
    /// `Running -> Stopped` (manifest removal or shutdown).
    async fn stop(&self) {}
}

/// What a probe instance uses to emit events back toward the relay (spec
/// §4.E "events they emit are routed back through the relay"). Kept as a
/// trait (not a direct dependency on the HTTP client) so probe
/// implementations stay testable without a running relay.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, data: Value, clear: bool);
}

/// One probe-type's plugin contract: config validation plus instantiation.
#[async_trait]
pub trait ProbeType: Send + Sync {
    /// `true` forces probes of this type into the node's privileged
    /// sandbox rather than the tenant sandbox (spec §3 `Probe.global`).
    fn run_in_global(&self) -> bool;

    /// Validates a probe's `config` object; the returned error's message
    /// (if any) is surfaced verbatim as the `InvalidArgument` detail (spec §4.B).
    fn validate_config(&self, config: &Value) -> Result<(), String>;

    /// Constructs a running instance from a validated config and its target context.
    fn new_instance(&self, config: Value, context: ProbeContext) -> Arc<dyn ProbeInstance>;
}

/// What a probe instance needs to know about where it's running, passed to
/// `new_instance` alongside `config` (spec §4.E plugin contract `(config, context)`).
#[derive(Debug, Clone)]
pub struct ProbeContext {
    pub user: String,
    pub monitor: String,
    pub name: String,
    pub machine: Option<String>,
    pub server: Option<String>,
}

#[derive(Default)]
pub struct ProbeTypeRegistry {
    types: HashMap<String, Arc<dyn ProbeType>>,
}

impl ProbeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, plugin: Arc<dyn ProbeType>) {
        self.types.insert(key.into(), plugin);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn ProbeType>> {
        self.types.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.types.contains_key(key)
    }
}
