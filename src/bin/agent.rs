use std::sync::Arc;

use amon::agent::client::RelayClient;
use amon::agent::reconcile::Reconciler;
use amon::agent::{poll, probes};
use amon::config::AgentConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "amon=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env();

    let client = Arc::new(RelayClient::new(config.relay_socket.clone()));
    let registry = Arc::new(probes::registry());
    let reconciler = Arc::new(Reconciler::new(registry, client.clone(), config.poll_interval));

    tracing::info!(socket = %config.relay_socket.display(), "amon-agent polling relay");
    poll::run(client, reconciler, config.poll_interval).await;

    Ok(())
}
