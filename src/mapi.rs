//! Machine-information API adapter (spec §1, §4.C) — out of scope itself,
//! specified only by the interface the authorizer uses: does this account
//! own this machine, does this server exist. Mirrors the shape of the
//! teacher's `adapter/` modules (one trait-free `struct` per external
//! collaborator, a `reqwest::Client` field, async methods returning
//! `Result`) generalized behind a trait so the authorizer can be tested
//! against a fake.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::AmonError;

#[async_trait]
pub trait MachineInfoApi: Send + Sync {
    async fn machine_owned_by(&self, account: &str, machine: &str) -> Result<bool, AmonError>;
    async fn machine_exists(&self, machine: &str) -> Result<bool, AmonError>;
    async fn server_exists(&self, server: &str) -> Result<bool, AmonError>;
}

pub struct HttpMachineInfoApi {
    base_url: String,
    client: Client,
}

impl HttpMachineInfoApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl MachineInfoApi for HttpMachineInfoApi {
    async fn machine_owned_by(&self, account: &str, machine: &str) -> Result<bool, AmonError> {
        let resp = self
            .client
            .get(self.url(&format!("/machines/{machine}")))
            .send()
            .await
            .map_err(|e| AmonError::Unavailable(format!("mapi unreachable: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !resp.status().is_success() {
            return Err(AmonError::Unavailable(format!(
                "mapi returned {}",
                resp.status()
            )));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AmonError::Unavailable(format!("mapi returned malformed json: {e}")))?;
        Ok(body.get("owner_uuid").and_then(|v| v.as_str()) == Some(account))
    }

    async fn machine_exists(&self, machine: &str) -> Result<bool, AmonError> {
        let resp = self
            .client
            .get(self.url(&format!("/machines/{machine}")))
            .send()
            .await
            .map_err(|e| AmonError::Unavailable(format!("mapi unreachable: {e}")))?;
        Ok(resp.status().is_success())
    }

    async fn server_exists(&self, server: &str) -> Result<bool, AmonError> {
        let resp = self
            .client
            .get(self.url(&format!("/servers/{server}")))
            .send()
            .await
            .map_err(|e| AmonError::Unavailable(format!("mapi unreachable: {e}")))?;
        Ok(resp.status().is_success())
    }
}

/// In-memory fake for authorization tests (spec §8 scenarios 1-4).
#[derive(Default)]
pub struct FakeMachineInfoApi {
    pub owned_machines: std::collections::HashSet<(String, String)>,
    pub known_machines: std::collections::HashSet<String>,
    pub known_servers: std::collections::HashSet<String>,
}

#[async_trait]
impl MachineInfoApi for FakeMachineInfoApi {
    async fn machine_owned_by(&self, account: &str, machine: &str) -> Result<bool, AmonError> {
        Ok(self
            .owned_machines
            .contains(&(account.to_string(), machine.to_string())))
    }

    async fn machine_exists(&self, machine: &str) -> Result<bool, AmonError> {
        Ok(self.known_machines.contains(machine))
    }

    async fn server_exists(&self, server: &str) -> Result<bool, AmonError> {
        Ok(self.known_servers.contains(server))
    }
}
