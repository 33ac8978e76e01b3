//! Relay-side Unix-domain-socket HTTP server (spec §4.E: "relays reach
//! their agents over a per-sandbox local socket, so the inbound
//! connection's origin identifies the target uniquely"). One listener is
//! bound per target — binding the socket *is* the identification, there
//! being no shared address space to multiplex requests on otherwise.
//!
//! Built directly on `hyper` + `hyper-util`'s server connection builder
//! over a `tokio::net::UnixListener`, the same hand-rolled shape as
//! `hyper`'s own unix-socket example, since `axum` itself has no
//! UDS-serving entry point.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use reqwest::Client;
use tokio::net::UnixListener;

use crate::config::RelayConfig;
use crate::model::probe::ProbeTarget;
use crate::retry::post_with_backoff;

use super::manifest;

/// Accepts connections on `socket_path` until the process exits, serving
/// `target`'s `HEAD|GET /agentprobes` from the cached manifest and
/// forwarding `POST /events` on to Master.
pub async fn run(
    config: Arc<RelayConfig>,
    target: ProbeTarget,
    socket_path: PathBuf,
    client: Client,
    dropped_events: Arc<AtomicU64>,
) -> std::io::Result<()> {
    let _ = std::fs::remove_file(&socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(&socket_path)?;
    tracing::info!(socket = %socket_path.display(), ?target, "relay serving agent socket");

    loop {
        let (stream, _addr) = listener.accept().await?;
        let config = config.clone();
        let target = target.clone();
        let client = client.clone();
        let dropped_events = dropped_events.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = hyper::service::service_fn(move |req| {
                handle(config.clone(), target.clone(), client.clone(), dropped_events.clone(), req)
            });
            if let Err(e) = ConnBuilder::new(TokioExecutor::new()).serve_connection(io, service).await {
                tracing::warn!(error = %e, "relay<->agent connection ended with error");
            }
        });
    }
}

async fn handle(
    config: Arc<RelayConfig>,
    target: ProbeTarget,
    client: Client,
    dropped_events: Arc<AtomicU64>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::HEAD, "/agentprobes") => {
            let (_, digest) = manifest::read_cached(&config.data_dir, &target).await;
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-MD5", digest)
                .body(Full::new(Bytes::new()))
                .unwrap())
        }
        (&Method::GET, "/agentprobes") => {
            let (body, digest) = manifest::read_cached(&config.data_dir, &target).await;
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json")
                .header("Content-MD5", digest)
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        (&Method::POST, "/events") => {
            let bytes = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(_) => return Ok(status_only(StatusCode::BAD_REQUEST)),
            };
            forward_event(config, client, dropped_events, bytes);
            Ok(status_only(StatusCode::ACCEPTED))
        }
        _ => Ok(status_only(StatusCode::NOT_FOUND)),
    }
}

/// Spawns the best-effort forward to Master so the agent's `POST /events`
/// returns immediately — the agent already considers the event delivered
/// once its relay has accepted it (spec §4.E "best-effort POST with
/// bounded retry" happens at this hop, not the agent's).
fn forward_event(config: Arc<RelayConfig>, client: Client, dropped_events: Arc<AtomicU64>, bytes: Bytes) {
    tokio::spawn(async move {
        let event: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed event from agent");
                return;
            }
        };
        let url = format!("{}/events", config.master_url.trim_end_matches('/'));
        post_with_backoff(&client, &url, &event, &dropped_events).await;
    });
}

fn status_only(status: StatusCode) -> Response<Full<Bytes>> {
    Response::builder().status(status).body(Full::new(Bytes::new())).unwrap()
}
