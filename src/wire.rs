//! Wire types shared verbatim across Master, Relay, and Agent (spec §6).
//! Putting them in one module — rather than letting each binary define its
//! own copy — is what makes the three processes' JSON actually identical;
//! this is the natural place for it in a multi-binary crate even though
//! spec.md never names it as its own component.

use serde::{Deserialize, Serialize};

pub const EVENT_WIRE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventProbeRef {
    pub user: String,
    pub monitor: String,
    pub name: String,
    #[serde(rename = "type")]
    pub probe_type: String,
}

/// The event wire format (spec §6). `v = 1` is the only version; an
/// inbound event with any other value is rejected with `400` before it
/// reaches the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub v: u32,
    pub uuid: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub user: String,
    pub monitor: String,
    pub time: i64,
    #[serde(default)]
    pub clear: bool,
    pub data: serde_json::Value,
    pub probe: EventProbeRef,
}

impl Event {
    pub fn is_supported_version(&self) -> bool {
        self.v == EVENT_WIRE_VERSION
    }
}

/// The base-64 MD5 of a manifest body (spec §4.E / §6 `.content-md5` /
/// `Content-MD5` header), computed the same way at every hop that needs it
/// — Master serving `/agentprobes` to relays, the relay writing its on-disk
/// cache, and the relay serving `/agentprobes` to agents.
pub fn content_md5(body: &[u8]) -> String {
    use base64::Engine;
    let digest = md5::compute(body);
    base64::engine::general_purpose::STANDARD.encode(digest.0)
}

#[cfg(test)]
mod content_md5_tests {
    use super::content_md5;

    #[test]
    fn matches_known_vector() {
        // md5("") == d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_the_literal_wire_shape_from_spec() {
        let json = serde_json::json!({
            "v": 1,
            "uuid": "11111111-1111-1111-1111-111111111111",
            "type": "probe",
            "user": "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa",
            "monitor": "whistle",
            "time": 1_700_000_000_000i64,
            "clear": false,
            "data": { "message": "tweet detected" },
            "probe": {
                "user": "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa",
                "monitor": "whistle",
                "name": "whistlelog",
                "type": "logscan"
            }
        });
        let event: Event = serde_json::from_value(json).unwrap();
        assert!(event.is_supported_version());
        assert_eq!(event.probe.name, "whistlelog");
    }
}
