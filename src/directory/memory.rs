//! In-memory `Directory` used by tests and examples. The real UFDS-shaped
//! service is out of scope (spec §1); this stand-in lets §8's end-to-end
//! scenarios run without a live LDAP server, the same way the pack's
//! `caching_layers` example keeps a `MockDb` behind a `Mutex` instead of a
//! real connection pool.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AmonError;
use crate::model::{dn::split_rdn, DirectoryEntry};

use super::{Directory, Scope, SearchOpts};

#[derive(Default)]
pub struct MemoryDirectory {
    entries: Mutex<HashMap<String, HashMap<String, Vec<String>>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn immediate_parent(dn: &str) -> Result<String, AmonError> {
        let (_, _, rest) = split_rdn(dn)?;
        Ok(rest)
    }

    /// Walks `dn`'s ancestor chain looking for `parent_dn` (spec §4.A
    /// `Scope::Subtree`: every descendant, not just immediate children —
    /// needed for `/agentprobes`, which searches from `o=smartdc` down
    /// through every account's probes).
    fn is_descendant_of(dn: &str, parent_dn: &str) -> Result<bool, AmonError> {
        let mut current = dn.to_string();
        loop {
            let rest = Self::immediate_parent(&current)?;
            if rest == parent_dn {
                return Ok(true);
            }
            if rest.is_empty() || rest == current {
                return Ok(false);
            }
            current = rest;
        }
    }

    /// Matches the small subset of LDAP filter syntax this crate ever
    /// constructs: `(objectclass=*)`, a single `(attr=value)`, or a
    /// top-level `(&(a=x)(b=y))` conjunction of such terms. Good enough for
    /// an in-memory stand-in; a real LDAP server parses the full grammar.
    fn matches_filter(attrs: &HashMap<String, Vec<String>>, filter: &str) -> bool {
        let filter = filter.trim();
        if let Some(inner) = filter.strip_prefix("(&").and_then(|s| s.strip_suffix(')')) {
            return Self::split_terms(inner)
                .iter()
                .all(|term| Self::matches_filter(attrs, term));
        }
        let Some(inner) = filter.strip_prefix('(').and_then(|s| s.strip_suffix(')')) else {
            return false;
        };
        let Some((attr, value)) = inner.split_once('=') else {
            return false;
        };
        if value == "*" {
            return attrs.contains_key(attr);
        }
        attrs.get(attr).map(|v| v.iter().any(|x| x == value)).unwrap_or(false)
    }

    /// Splits `"(a=x)(b=y)"` into `["(a=x)", "(b=y)"]`.
    fn split_terms(joined: &str) -> Vec<&str> {
        let mut terms = Vec::new();
        let mut depth = 0;
        let mut start = 0;
        for (i, c) in joined.char_indices() {
            match c {
                '(' => {
                    if depth == 0 {
                        start = i;
                    }
                    depth += 1;
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        terms.push(&joined[start..=i]);
                    }
                }
                _ => {}
            }
        }
        terms
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn search(&self, parent_dn: &str, opts: SearchOpts) -> Result<Vec<DirectoryEntry>, AmonError> {
        let entries = self.entries.lock().unwrap();
        match opts.scope {
            Scope::Base => Ok(entries
                .get(parent_dn)
                .map(|attrs| vec![DirectoryEntry {
                    dn: parent_dn.to_string(),
                    attrs: attrs.clone(),
                }])
                .unwrap_or_default()),
            Scope::OneLevel => {
                let mut out = Vec::new();
                for (dn, attrs) in entries.iter() {
                    if dn == parent_dn {
                        continue;
                    }
                    if Self::immediate_parent(dn)? == parent_dn && Self::matches_filter(attrs, &opts.filter) {
                        out.push(DirectoryEntry {
                            dn: dn.clone(),
                            attrs: attrs.clone(),
                        });
                    }
                }
                out.sort_by(|a, b| a.dn.cmp(&b.dn));
                Ok(out)
            }
            Scope::Subtree => {
                let mut out = Vec::new();
                for (dn, attrs) in entries.iter() {
                    if dn == parent_dn {
                        continue;
                    }
                    if Self::is_descendant_of(dn, parent_dn)? && Self::matches_filter(attrs, &opts.filter) {
                        out.push(DirectoryEntry {
                            dn: dn.clone(),
                            attrs: attrs.clone(),
                        });
                    }
                }
                out.sort_by(|a, b| a.dn.cmp(&b.dn));
                Ok(out)
            }
        }
    }

    async fn add(&self, dn: &str, attrs: HashMap<String, Vec<String>>) -> Result<(), AmonError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(dn) {
            return Err(AmonError::InvalidArgument(format!("already exists: {dn}")));
        }
        entries.insert(dn.to_string(), attrs);
        Ok(())
    }

    async fn modify(&self, dn: &str, attrs: HashMap<String, Vec<String>>) -> Result<(), AmonError> {
        let mut entries = self.entries.lock().unwrap();
        if !entries.contains_key(dn) {
            return Err(AmonError::ResourceNotFound(dn.to_string()));
        }
        entries.insert(dn.to_string(), attrs);
        Ok(())
    }

    async fn delete(&self, dn: &str) -> Result<(), AmonError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(dn).is_none() {
            return Err(AmonError::ResourceNotFound(dn.to_string()));
        }
        Ok(())
    }
}
