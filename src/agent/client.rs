//! Hand-rolled HTTP/1 client over the relay's per-target Unix-domain
//! socket (spec §4.E). Mirrors `relay::server`'s hand-rolled hyper server
//! from the other direction — one fresh connection per call, since these
//! are infrequent poll/emit calls rather than a hot path needing
//! connection reuse.

use std::path::PathBuf;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use crate::error::AmonError;
use crate::wire::Event;

pub struct RelayClient {
    socket_path: PathBuf,
}

impl RelayClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    async fn connect(&self) -> Result<http1::SendRequest<Full<Bytes>>, AmonError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| AmonError::Unavailable(format!("connecting to relay socket: {e}")))?;
        let io = TokioIo::new(stream);
        let (sender, conn) = http1::handshake(io)
            .await
            .map_err(|e| AmonError::Unavailable(format!("relay handshake failed: {e}")))?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!(error = %e, "relay connection closed with error");
            }
        });
        Ok(sender)
    }

    /// `HEAD /agentprobes` (spec §4.E agent contract): the relay's
    /// `Content-MD5`, compared against the last-seen value to decide
    /// whether a `GET` is needed at all.
    pub async fn head_agentprobes(&self) -> Result<Option<String>, AmonError> {
        let mut sender = self.connect().await?;
        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/agentprobes")
            .header("host", "localhost")
            .body(Full::new(Bytes::new()))
            .map_err(|e| AmonError::InternalError(e.to_string()))?;
        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| AmonError::Unavailable(format!("relay HEAD failed: {e}")))?;
        Ok(resp
            .headers()
            .get("Content-MD5")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }

    pub async fn get_agentprobes(&self) -> Result<Vec<u8>, AmonError> {
        let mut sender = self.connect().await?;
        let req = Request::builder()
            .method(Method::GET)
            .uri("/agentprobes")
            .header("host", "localhost")
            .body(Full::new(Bytes::new()))
            .map_err(|e| AmonError::InternalError(e.to_string()))?;
        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| AmonError::Unavailable(format!("relay GET failed: {e}")))?;
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| AmonError::Unavailable(format!("reading relay response body: {e}")))?
            .to_bytes();
        Ok(body.to_vec())
    }

    /// Posts one emitted event to the relay's `POST /events` (spec §4.E
    /// "events they emit are routed back through the relay").
    pub async fn post_event(&self, event: &Event) -> Result<(), AmonError> {
        let mut sender = self.connect().await?;
        let body = serde_json::to_vec(event).map_err(|e| AmonError::InternalError(e.to_string()))?;
        let req = Request::builder()
            .method(Method::POST)
            .uri("/events")
            .header("host", "localhost")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| AmonError::InternalError(e.to_string()))?;
        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| AmonError::Unavailable(format!("posting event to relay: {e}")))?;
        if !resp.status().is_success() {
            return Err(AmonError::Unavailable(format!("relay rejected event: {}", resp.status())));
        }
        Ok(())
    }
}
