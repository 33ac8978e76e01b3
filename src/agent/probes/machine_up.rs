//! The one illustrative real `ProbeType` conformer (spec §4.E, and the doc
//! comment on `crate::plugins::probe_type` naming this module): a TCP
//! connect-liveness check against `host:port`, always run in the global
//! zone since a tenant sandbox cannot be trusted to report its own host's
//! liveness honestly.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::TcpStream;

use crate::error::AmonError;
use crate::plugins::probe_type::{EventEmitter, ProbeContext, ProbeInstance, ProbeType};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct MachineUpProbeType;

#[async_trait]
impl ProbeType for MachineUpProbeType {
    fn run_in_global(&self) -> bool {
        true
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        let host = config
            .get("host")
            .and_then(Value::as_str)
            .ok_or_else(|| "config.host is required and must be a string".to_string())?;
        if host.is_empty() {
            return Err("config.host must not be empty".to_string());
        }
        let port = config
            .get("port")
            .and_then(Value::as_u64)
            .ok_or_else(|| "config.port is required and must be a number".to_string())?;
        if port == 0 || port > u64::from(u16::MAX) {
            return Err("config.port must be between 1 and 65535".to_string());
        }
        Ok(())
    }

    fn new_instance(&self, config: Value, context: ProbeContext) -> Arc<dyn ProbeInstance> {
        let host = config.get("host").and_then(Value::as_str).unwrap_or_default().to_string();
        let port = config.get("port").and_then(Value::as_u64).unwrap_or_default() as u16;
        Arc::new(MachineUpInstance {
            host,
            port,
            context,
            last_up: AtomicBool::new(true),
        })
    }
}

struct MachineUpInstance {
    host: String,
    port: u16,
    context: ProbeContext,
    /// Starts optimistic so the very first failed connect emits a fault
    /// rather than a no-op "transition" from an unknown prior state.
    last_up: AtomicBool,
}

#[async_trait]
impl ProbeInstance for MachineUpInstance {
    async fn run_once(&self, emit: &dyn EventEmitter) -> Result<(), AmonError> {
        let connected = self.probe_once().await;
        let was_up = self.last_up.swap(connected, Ordering::SeqCst);

        if was_up && !connected {
            emit.emit(
                serde_json::json!({
                    "message": format!("{}:{} is unreachable", self.host, self.port),
                    "host": self.host,
                    "port": self.port,
                }),
                false,
            )
            .await;
        } else if !was_up && connected {
            emit.emit(
                serde_json::json!({
                    "message": format!("{}:{} is reachable again", self.host, self.port),
                    "host": self.host,
                    "port": self.port,
                }),
                true,
            )
            .await;
        }
        Ok(())
    }
}

impl MachineUpInstance {
    async fn probe_once(&self) -> bool {
        let addr = format!("{}:{}", self.host, self.port);
        let Ok(resolved) = tokio::net::lookup_host(&addr).await else {
            return false;
        };
        let candidates: Vec<SocketAddr> = resolved.collect();
        if candidates.is_empty() {
            return false;
        }
        for candidate in candidates {
            if tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(candidate))
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false)
            {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ProbeContext {
        ProbeContext {
            user: "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string(),
            monitor: "whistle".to_string(),
            name: "up-check".to_string(),
            machine: Some("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb".to_string()),
            server: None,
        }
    }

    #[test]
    fn rejects_missing_host() {
        let probe = MachineUpProbeType;
        let err = probe.validate_config(&serde_json::json!({"port": 80})).unwrap_err();
        assert!(err.contains("host"));
    }

    #[test]
    fn rejects_out_of_range_port() {
        let probe = MachineUpProbeType;
        let err = probe
            .validate_config(&serde_json::json!({"host": "127.0.0.1", "port": 70000}))
            .unwrap_err();
        assert!(err.contains("port"));
    }

    #[test]
    fn accepts_valid_config() {
        let probe = MachineUpProbeType;
        assert!(probe
            .validate_config(&serde_json::json!({"host": "127.0.0.1", "port": 22}))
            .is_ok());
    }

    #[test]
    fn always_runs_in_global_zone() {
        assert!(MachineUpProbeType.run_in_global());
    }

    struct RecordingEmitter {
        calls: tokio::sync::Mutex<Vec<(Value, bool)>>,
    }

    #[async_trait]
    impl EventEmitter for RecordingEmitter {
        async fn emit(&self, data: Value, clear: bool) {
            self.calls.lock().await.push((data, clear));
        }
    }

    #[tokio::test]
    async fn unreachable_port_emits_fault_on_first_run() {
        let probe = MachineUpProbeType;
        let instance = probe.new_instance(serde_json::json!({"host": "127.0.0.1", "port": 1}), ctx());
        let emitter = RecordingEmitter {
            calls: tokio::sync::Mutex::new(Vec::new()),
        };
        instance.run_once(&emitter).await.unwrap();
        let calls = emitter.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].1, "a down transition must not be a clear event");
    }

    #[tokio::test]
    async fn repeated_down_does_not_re_emit() {
        let probe = MachineUpProbeType;
        let instance = probe.new_instance(serde_json::json!({"host": "127.0.0.1", "port": 1}), ctx());
        let emitter = RecordingEmitter {
            calls: tokio::sync::Mutex::new(Vec::new()),
        };
        instance.run_once(&emitter).await.unwrap();
        instance.run_once(&emitter).await.unwrap();
        assert_eq!(emitter.calls.lock().await.len(), 1);
    }
}
