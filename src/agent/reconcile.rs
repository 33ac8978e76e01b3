//! The agent-side probe state machine (spec §4.E, §5): `Pending → Running
//! → Stopped`. One `Reconciler` per agent process; `reconcile` is called
//! once per fetched manifest and diffs it against the currently running
//! set by `(user, monitor, name)`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::agent::client::RelayClient;
use crate::agent::relay_emitter::RelayEmitter;
use crate::model::probe::Probe;
use crate::plugins::probe_type::{ProbeContext, ProbeInstance, ProbeTypeRegistry};

type ProbeKey = (String, String, String);

fn key_of(probe: &Probe) -> ProbeKey {
    (probe.user.clone(), probe.monitor.clone(), probe.name.clone())
}

struct Tracked {
    probe: Probe,
    instance: Arc<dyn ProbeInstance>,
    task: JoinHandle<()>,
}

/// Drives every probe in the current manifest through `Pending -> Running`,
/// restarts ones whose definition changed, and stops ones the manifest no
/// longer names (spec §4.E agent contract). `reconcile` holds the tracked
/// set locked for its whole pass so two manifest snapshots' start/stop
/// operations never interleave (spec §5).
pub struct Reconciler {
    registry: Arc<ProbeTypeRegistry>,
    client: Arc<RelayClient>,
    run_interval: Duration,
    tracked: Mutex<HashMap<ProbeKey, Tracked>>,
}

impl Reconciler {
    pub fn new(registry: Arc<ProbeTypeRegistry>, client: Arc<RelayClient>, run_interval: Duration) -> Self {
        Self {
            registry,
            client,
            run_interval,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    pub async fn reconcile(&self, manifest: Vec<Probe>) {
        let mut tracked = self.tracked.lock().await;
        let mut seen: HashSet<ProbeKey> = HashSet::new();

        for probe in manifest {
            let key = key_of(&probe);
            seen.insert(key.clone());

            match tracked.get(&key) {
                Some(existing) if existing.probe == probe => {
                    // Running -> Running, config-equal reload: no-op.
                }
                Some(existing) => {
                    tracing::info!(?key, "probe definition changed, restarting");
                    existing.instance.stop().await;
                    existing.task.abort();
                    tracked.remove(&key);
                    self.start(&mut tracked, key, probe).await;
                }
                None => {
                    tracing::info!(?key, "new probe in manifest, starting");
                    self.start(&mut tracked, key, probe).await;
                }
            }
        }

        let dropped: Vec<ProbeKey> = tracked.keys().filter(|k| !seen.contains(*k)).cloned().collect();
        for key in dropped {
            if let Some(existing) = tracked.remove(&key) {
                tracing::info!(?key, "probe removed from manifest, stopping");
                existing.instance.stop().await;
                existing.task.abort();
            }
        }
    }

    async fn start(&self, tracked: &mut HashMap<ProbeKey, Tracked>, key: ProbeKey, probe: Probe) {
        let plugin = match self.registry.get(&probe.probe_type) {
            Some(p) => p,
            None => {
                tracing::warn!(probe_type = %probe.probe_type, "no registered probe type, skipping");
                return;
            }
        };
        let context = ProbeContext {
            user: probe.user.clone(),
            monitor: probe.monitor.clone(),
            name: probe.name.clone(),
            machine: probe.machine.clone(),
            server: probe.server.clone(),
        };
        let emitter = Arc::new(RelayEmitter::new(self.client.clone(), context.clone(), probe.probe_type.clone()));
        let instance = plugin.new_instance(probe.config.clone(), context);
        let task = self.spawn_run_loop(instance.clone(), emitter);
        tracked.insert(key, Tracked { probe, instance, task });
    }

    fn spawn_run_loop(&self, instance: Arc<dyn ProbeInstance>, emitter: Arc<RelayEmitter>) -> JoinHandle<()> {
        let interval = self.run_interval;
        tokio::spawn(async move {
            loop {
                if let Err(e) = instance.run_once(emitter.as_ref()).await {
                    tracing::warn!(error = %e, "probe instance fatal error, stopping until next manifest change");
                    return; // * -> Stopped on fatal plugin error (spec §4.E)
                }
                tokio::time::sleep(interval).await;
            }
        })
    }

    #[cfg(test)]
    pub async fn running_keys(&self) -> HashSet<ProbeKey> {
        self.tracked.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::probe_type::{EventEmitter, ProbeType};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbeType {
        starts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProbeType for CountingProbeType {
        fn run_in_global(&self) -> bool {
            false
        }
        fn validate_config(&self, _config: &Value) -> Result<(), String> {
            Ok(())
        }
        fn new_instance(&self, _config: Value, _context: ProbeContext) -> Arc<dyn ProbeInstance> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            struct Idle;
            #[async_trait]
            impl ProbeInstance for Idle {
                async fn run_once(&self, _emit: &dyn EventEmitter) -> Result<(), crate::error::AmonError> {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
            Arc::new(Idle)
        }
    }

    fn probe(name: &str) -> Probe {
        Probe {
            name: name.to_string(),
            user: "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string(),
            monitor: "whistle".to_string(),
            probe_type: "counting".to_string(),
            machine: Some("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb".to_string()),
            server: None,
            config: serde_json::json!({}),
            global: false,
            dn: format!("probe={name}, monitor=whistle, uuid=aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa, ou=users, o=smartdc"),
        }
    }

    fn test_reconciler(starts: Arc<AtomicUsize>) -> Reconciler {
        let mut registry = ProbeTypeRegistry::new();
        registry.register("counting", Arc::new(CountingProbeType { starts }));
        Reconciler::new(
            Arc::new(registry),
            Arc::new(RelayClient::new(std::path::PathBuf::from("/nonexistent.sock"))),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn new_probe_starts_and_tracks() {
        let starts = Arc::new(AtomicUsize::new(0));
        let reconciler = test_reconciler(starts.clone());

        reconciler.reconcile(vec![probe("whistlelog")]).await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(reconciler.running_keys().await.len(), 1);
    }

    #[tokio::test]
    async fn unchanged_probe_does_not_restart() {
        let starts = Arc::new(AtomicUsize::new(0));
        let reconciler = test_reconciler(starts.clone());

        reconciler.reconcile(vec![probe("whistlelog")]).await;
        reconciler.reconcile(vec![probe("whistlelog")]).await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_probe_restarts() {
        let starts = Arc::new(AtomicUsize::new(0));
        let reconciler = test_reconciler(starts.clone());

        reconciler.reconcile(vec![probe("whistlelog")]).await;
        let mut changed = probe("whistlelog");
        changed.config = serde_json::json!({"threshold": 2});
        reconciler.reconcile(vec![changed]).await;

        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(reconciler.running_keys().await.len(), 1);
    }

    #[tokio::test]
    async fn dropped_probe_stops() {
        let starts = Arc::new(AtomicUsize::new(0));
        let reconciler = test_reconciler(starts.clone());

        reconciler.reconcile(vec![probe("whistlelog")]).await;
        reconciler.reconcile(vec![]).await;

        assert!(reconciler.running_keys().await.is_empty());
    }
}
