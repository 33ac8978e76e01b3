//! End-to-end tests for spec §8's literal scenarios that cross a process
//! boundary a unit test inside `src/` can't reach on its own: the
//! relay<->agent manifest sync over a real Unix-domain socket (scenario 5)
//! and the cache-invalidates-on-delete property (P4).

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use amon::account::FakeAccountService;
use amon::agent::client::RelayClient;
use amon::config::{AccountsConfig, CacheConfig, MapiConfig, MasterConfig, RelayConfig, UfdsConfig};
use amon::directory::MemoryDirectory;
use amon::mapi::FakeMachineInfoApi;
use amon::master::AppState;
use amon::model::contact::ContactPublicForm;
use amon::model::probe::{Probe, ProbePublicForm, ProbeTarget};
use amon::model::Contact;
use amon::plugins::notification::LogNotificationPlugin;
use amon::plugins::{NotificationRegistry, ProbeTypeRegistry};
use amon::relay::{manifest, server};
use amon::wire::content_md5;

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

fn test_state() -> AppState {
    let mut registry = ProbeTypeRegistry::new();
    registry.register("logscan", Arc::new(StubProbeType));
    AppState::new(
        &test_config(),
        Arc::new(MemoryDirectory::new()),
        Arc::new(FakeMachineInfoApi::default()),
        Arc::new(FakeAccountService::default()),
        Arc::new(registry),
        Arc::new(NotificationRegistry::new()),
    )
}

struct StubProbeType;

#[async_trait::async_trait]
impl amon::plugins::probe_type::ProbeType for StubProbeType {
    fn run_in_global(&self) -> bool {
        false
    }
    fn validate_config(&self, _config: &serde_json::Value) -> Result<(), String> {
        Ok(())
    }
    fn new_instance(
        &self,
        _config: serde_json::Value,
        _context: amon::plugins::probe_type::ProbeContext,
    ) -> Arc<dyn amon::plugins::probe_type::ProbeInstance> {
        unimplemented!("not exercised by these tests")
    }
}

async fn wait_for_socket(path: &std::path::Path) {
    for _ in 0..100 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("relay socket never appeared at {}", path.display());
}

/// Spec §8 scenario 5: manifest sync. The relay's on-disk cache is written
/// by the poll loop in production; here it's written directly to isolate
/// "does the agent-facing socket serve exactly what's on disk" from "does
/// polling Master work", which `relay::poll`'s own unit tests already cover.
#[tokio::test]
async fn scenario5_manifest_sync_over_agent_socket() {
    let data_dir = tempfile::tempdir().unwrap();
    let socket_dir = tempfile::tempdir().unwrap();
    let socket_path = socket_dir.path().join("machine-test.sock");

    let config = Arc::new(RelayConfig {
        master_url: "http://unused".to_string(),
        data_dir: data_dir.path().to_path_buf(),
        socket_dir: socket_dir.path().to_path_buf(),
        poll_interval: Duration::from_secs(30),
        targets: vec![],
    });
    let target = ProbeTarget::Machine("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string());
    let dropped = Arc::new(AtomicU64::new(0));

    let probe_json = serde_json::json!([{
        "name": "whistlelog",
        "user": "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb",
        "monitor": "whistle",
        "type": "logscan",
        "machine": "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa",
        "config": {"path": "/tmp/whistle.log"},
    }]);
    let body = serde_json::to_vec(&probe_json).unwrap();
    assert!(manifest::write_if_changed(&config.data_dir, &target, &body).await.unwrap());

    let server_config = config.clone();
    let server_target = target.clone();
    let server_socket = socket_path.clone();
    tokio::spawn(async move {
        server::run(server_config, server_target, server_socket, reqwest::Client::new(), dropped)
            .await
            .unwrap();
    });
    wait_for_socket(&socket_path).await;

    let client = RelayClient::new(socket_path.clone());

    let digest = client.head_agentprobes().await.unwrap().unwrap();
    assert_eq!(digest, content_md5(&body));

    let fetched = client.get_agentprobes().await.unwrap();
    let probes: Vec<serde_json::Value> = serde_json::from_slice(&fetched).unwrap();
    assert_eq!(probes.len(), 1);
    assert_eq!(probes[0]["name"], "whistlelog");

    // Master deletes the probe: within one poll interval the relay
    // overwrites both files with the empty manifest.
    let empty = b"[]".to_vec();
    assert!(manifest::write_if_changed(&config.data_dir, &target, &empty).await.unwrap());

    let new_digest = client.head_agentprobes().await.unwrap().unwrap();
    assert_ne!(new_digest, digest);
    assert_eq!(new_digest, content_md5(&empty));

    let fetched_after = client.get_agentprobes().await.unwrap();
    let probes_after: Vec<serde_json::Value> = serde_json::from_slice(&fetched_after).unwrap();
    assert!(probes_after.is_empty());
}

/// Spec §8 P4: a DELETE must invalidate any cached GET, even though the
/// cache's TTL hasn't expired yet.
#[tokio::test]
async fn p4_delete_invalidates_cached_get() {
    let state = test_state();
    let user = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";

    let contact = Contact::from_public(ContactPublicForm {
        name: "ops".to_string(),
        user: user.to_string(),
        medium: "log".to_string(),
        data: "ops@example.com".to_string(),
    })
    .unwrap();
    state.put_contact(&contact).await.unwrap();

    // Prime the cache.
    state.get_contact(user, "ops").await.unwrap();

    state.delete_contact(user, "ops").await.unwrap();

    let err = state.get_contact(user, "ops").await.unwrap_err();
    assert!(matches!(err, amon::error::AmonError::ResourceNotFound(_)));
}

/// Companion to P4 for Probe, since probes carry their own cache and their
/// own DELETE authorization path.
#[tokio::test]
async fn p4_probe_delete_invalidates_cached_get() {
    let state = test_state();
    let mut registry = ProbeTypeRegistry::new();
    registry.register("logscan", Arc::new(StubProbeType));

    let probe = Probe::from_public(
        ProbePublicForm {
            name: "whistlelog".to_string(),
            user: "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string(),
            monitor: "whistle".to_string(),
            probe_type: "logscan".to_string(),
            machine: Some("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb".to_string()),
            server: None,
            config: serde_json::json!({}),
        },
        &registry,
    )
    .unwrap();
    state.put_probe(&probe).await.unwrap();

    state.get_probe("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa", "whistle", "whistlelog").await.unwrap();

    state
        .delete_probe("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa", "whistle", "whistlelog")
        .await
        .unwrap();

    let err = state
        .get_probe("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa", "whistle", "whistlelog")
        .await
        .unwrap_err();
    assert!(matches!(err, amon::error::AmonError::ResourceNotFound(_)));
}
