//! Account resolution — "the account record itself is external" (spec §3).
//! This adapter only ever answers "what UUID does this login map to",
//! which is all the rest of the core needs; everything else about an
//! account (profile, billing, …) stays outside this crate.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::AmonError;

#[async_trait]
pub trait AccountService: Send + Sync {
    async fn resolve_login(&self, login: &str) -> Result<String, AmonError>;
}

pub struct HttpAccountService {
    base_url: String,
    client: Client,
}

impl HttpAccountService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl AccountService for HttpAccountService {
    async fn resolve_login(&self, login: &str) -> Result<String, AmonError> {
        let url = format!("{}/accounts/{login}", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AmonError::Unavailable(format!("account service unreachable: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AmonError::ResourceNotFound(format!("no such account: {login}")));
        }
        if !resp.status().is_success() {
            return Err(AmonError::Unavailable(format!(
                "account service returned {}",
                resp.status()
            )));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AmonError::Unavailable(format!("account service returned malformed json: {e}")))?;
        body.get("uuid")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| AmonError::InternalError("account service response missing uuid".to_string()))
    }
}

/// In-memory fake for tests.
#[derive(Default)]
pub struct FakeAccountService {
    pub logins: std::collections::HashMap<String, String>,
}

#[async_trait]
impl AccountService for FakeAccountService {
    async fn resolve_login(&self, login: &str) -> Result<String, AmonError> {
        self.logins
            .get(login)
            .cloned()
            .ok_or_else(|| AmonError::ResourceNotFound(format!("no such account: {login}")))
    }
}
