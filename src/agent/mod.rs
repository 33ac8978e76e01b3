//! The per-sandbox probe runner (spec §4.E). Polls its relay's local
//! socket for a probe manifest, reconciles the running set against it, and
//! routes emitted events back through the same socket.

pub mod client;
pub mod poll;
pub mod probes;
pub mod reconcile;
pub mod relay_emitter;
