//! Directory adapter (spec §4.A) — a thin semantic view over the external
//! directory service. Higher layers talk only to the `Directory` trait;
//! none of them know whether it's backed by a real LDAP connection
//! (`LdapDirectory`) or the in-memory fake used in tests (`MemoryDirectory`).

pub mod ldap;
pub mod memory;

pub use ldap::LdapDirectory;
pub use memory::MemoryDirectory;

use async_trait::async_trait;

use crate::error::AmonError;
use crate::model::DirectoryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Base,
    OneLevel,
    Subtree,
}

#[derive(Debug, Clone)]
pub struct SearchOpts {
    pub filter: String,
    pub scope: Scope,
}

impl SearchOpts {
    pub fn one_level(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            scope: Scope::OneLevel,
        }
    }

    pub fn base() -> Self {
        Self {
            filter: "(objectclass=*)".to_string(),
            scope: Scope::Base,
        }
    }
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn search(&self, parent_dn: &str, opts: SearchOpts) -> Result<Vec<DirectoryEntry>, AmonError>;
    async fn add(&self, dn: &str, attrs: std::collections::HashMap<String, Vec<String>>) -> Result<(), AmonError>;
    async fn modify(&self, dn: &str, attrs: std::collections::HashMap<String, Vec<String>>) -> Result<(), AmonError>;
    async fn delete(&self, dn: &str) -> Result<(), AmonError>;

    /// Convenience built on `search` with `Scope::Base`: fetch exactly one
    /// entry by DN, `ResourceNotFound` if absent, `InternalError` if the
    /// directory somehow returns more than one (spec §7).
    async fn get(&self, dn: &str) -> Result<DirectoryEntry, AmonError> {
        let mut results = self.search(dn, SearchOpts::base()).await?;
        match results.len() {
            0 => Err(AmonError::ResourceNotFound(dn.to_string())),
            1 => Ok(results.remove(0)),
            _ => Err(AmonError::InternalError(format!(
                "directory returned {} entries for a single-dn get at {dn}",
                results.len()
            ))),
        }
    }
}
