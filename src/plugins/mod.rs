//! Typed plugin registries (spec §9 "Dynamic dispatch over probe types /
//! notification media"): `map<string, ProbeType>` and
//! `map<string, NotificationPlugin>`, built once at startup from
//! configuration. New probe types or notification media are added by
//! registering a new value in one of these maps, never by subclassing or
//! matching on a type-name string scattered through the codebase.

pub mod notification;
pub mod probe_type;

pub use notification::{NotificationPlugin, NotificationRegistry};
pub use probe_type::{ProbeType, ProbeTypeRegistry};
