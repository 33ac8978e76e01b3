//! Shared best-effort POST-with-backoff helper. Spec §4.E "Event
//! forwarding" and §7 both describe the same policy — exponential backoff
//! capped at a few minutes, drop with a counter increment after the cap —
//! for every hop in the agent -> relay -> Master chain, so it lives in one
//! place rather than being reimplemented per hop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(180);
const MAX_ATTEMPTS: u32 = 6;

/// POSTs `body` as JSON to `url`, retrying on failure with exponential
/// backoff capped at `MAX_BACKOFF`. Gives up after `MAX_ATTEMPTS`,
/// incrementing `dropped` and returning `false` ("drop with a counter
/// increment after cap", spec §4.E).
pub async fn post_with_backoff<T>(client: &Client, url: &str, body: &T, dropped: &AtomicU64) -> bool
where
    T: Serialize + ?Sized,
{
    let mut backoff = INITIAL_BACKOFF;
    for attempt in 1..=MAX_ATTEMPTS {
        match client.post(url).json(body).send().await {
            Ok(resp) if resp.status().is_success() => return true,
            Ok(resp) => {
                tracing::warn!(url, attempt, status = %resp.status(), "forward rejected, will retry");
            }
            Err(e) => {
                tracing::warn!(url, attempt, error = %e, "forward failed, will retry");
            }
        }
        if attempt < MAX_ATTEMPTS {
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
    dropped.fetch_add(1, Ordering::Relaxed);
    tracing::error!(url, "forward dropped after exhausting retries");
    false
}
