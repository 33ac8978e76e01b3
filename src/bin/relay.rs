use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use amon::config::RelayConfig;
use amon::relay::{poll, server};
use reqwest::Client;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "amon=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(RelayConfig::from_env());
    if config.targets.is_empty() {
        tracing::warn!("RELAY_TARGETS is empty; this relay will serve no agents");
    }

    let client = Client::new();
    let dropped_events = Arc::new(AtomicU64::new(0));

    // One poll task (relay -> Master) and one Unix-socket server task
    // (relay -> its agent) per target (spec §4.E "each relay serves N
    // targets"), all sharing the relay's single on-disk manifest cache and
    // event-forward client.
    let mut tasks = Vec::new();
    for target in &config.targets {
        let poll_config = config.clone();
        let poll_client = client.clone();
        let poll_target = target.clone();
        tasks.push(tokio::spawn(async move {
            poll::run(poll_config, poll_client, poll_target).await;
        }));

        let server_config = config.clone();
        let server_client = client.clone();
        let server_target = target.clone();
        let socket_path = config.socket_path(target);
        let server_dropped = dropped_events.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server::run(server_config, server_target, socket_path, server_client, server_dropped).await {
                tracing::error!(error = %e, "relay agent-socket server exited");
            }
        }));
    }

    tracing::info!(targets = config.targets.len(), "amon-relay running");
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}
