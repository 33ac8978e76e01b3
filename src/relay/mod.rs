//! Relay ⇄ Agent probe-sync, relay side (spec §4.E). One poll task and one
//! Unix-socket server task run per target the relay serves; `bin/relay.rs`
//! spawns the pair for every entry in `RelayConfig::targets`.

pub mod manifest;
pub mod poll;
pub mod server;
