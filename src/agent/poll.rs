//! The agent's top-level loop (spec §4.E agent contract): `HEAD` the
//! relay's cached manifest, skip straight to sleeping if its digest hasn't
//! moved, otherwise `GET` and hand the decoded probe list to the
//! reconciler.

use std::sync::Arc;
use std::time::Duration;

use crate::agent::client::RelayClient;
use crate::agent::reconcile::Reconciler;
use crate::model::probe::Probe;

pub async fn run(client: Arc<RelayClient>, reconciler: Arc<Reconciler>, poll_interval: Duration) {
    let mut last_digest: Option<String> = None;
    loop {
        match tick(&client, &reconciler, &last_digest).await {
            Ok(Some(digest)) => last_digest = Some(digest),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "agent poll failed, will retry next tick"),
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Returns `Ok(Some(digest))` when the manifest was re-fetched and applied
/// (the caller should remember `digest` for next time), `Ok(None)` when the
/// digest was unchanged and nothing needed doing.
async fn tick(
    client: &RelayClient,
    reconciler: &Reconciler,
    last_digest: &Option<String>,
) -> Result<Option<String>, String> {
    let digest = client.head_agentprobes().await.map_err(|e| e.to_string())?;
    if digest.is_some() && digest == *last_digest {
        return Ok(None);
    }

    let body = client.get_agentprobes().await.map_err(|e| e.to_string())?;
    let probes: Vec<Probe> = serde_json::from_slice(&body).map_err(|e| format!("decoding manifest: {e}"))?;
    reconciler.reconcile(probes).await;
    Ok(Some(digest.unwrap_or_default()))
}
