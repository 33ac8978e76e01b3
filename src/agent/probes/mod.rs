//! Built-in probe-type implementations the agent binary registers at
//! startup (spec §4.E). A real deployment would load many more from
//! dynamically-loaded plugins (spec §1 Non-goals) — this crate ships the
//! one illustrative conformer.

pub mod machine_up;

use std::sync::Arc;

use crate::plugins::probe_type::ProbeTypeRegistry;

pub fn registry() -> ProbeTypeRegistry {
    let mut registry = ProbeTypeRegistry::new();
    registry.register("machine-up", Arc::new(machine_up::MachineUpProbeType));
    registry
}
