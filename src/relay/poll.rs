//! Relay poll loop (spec §4.E): one task per target, ticking against
//! Master's `GET /agentprobes` and rewriting the on-disk manifest when the
//! content hash changes.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::Client;

use crate::config::RelayConfig;
use crate::model::probe::ProbeTarget;

use super::manifest;

/// Runs until the process exits, sleeping `poll_interval` ±10% between
/// ticks (spec §4.E "jitter ±10% to avoid thundering herd across the
/// fleet"). Each tick awaits the previous one to completion before
/// sleeping again, so overlapping ticks can't happen — the "skip the next
/// tick" rule in spec §5 holds trivially for a strictly sequential loop.
pub async fn run(config: Arc<RelayConfig>, client: Client, target: ProbeTarget) {
    loop {
        match poll_once(&config, &client, &target).await {
            Ok(true) => tracing::info!(?target, "relay manifest updated"),
            Ok(false) => {}
            Err(e) => tracing::warn!(?target, error = %e, "relay poll failed, retrying next tick"),
        }
        tokio::time::sleep(jittered(config.poll_interval)).await;
    }
}

fn jittered(base: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.9..=1.1_f64);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

async fn poll_once(config: &RelayConfig, client: &Client, target: &ProbeTarget) -> Result<bool, String> {
    let (kind, uuid) = target.type_and_uuid();
    let url = format!("{}/agentprobes?{kind}={uuid}", config.master_url.trim_end_matches('/'));

    let resp = client.get(&url).send().await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("master returned {}", resp.status()));
    }
    let body = resp.bytes().await.map_err(|e| e.to_string())?;

    manifest::write_if_changed(&config.data_dir, target, &body)
        .await
        .map_err(|e| e.to_string())
}
