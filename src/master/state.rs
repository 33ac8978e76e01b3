//! Shared Master state — the `Arc<AppState>` every axum handler takes,
//! generalized from the teacher's `state.rs` (one struct holding every
//! shared collaborator, constructed once in `main` and cloned per request).

use std::sync::Arc;
use std::time::Duration;

use crate::account::AccountService;
use crate::authz::AuthzCache;
use crate::cache::TtlLruCache;
use crate::config::MasterConfig;
use crate::directory::{Directory, Scope, SearchOpts};
use crate::error::AmonError;
use crate::mapi::MachineInfoApi;
use crate::model::{dn, Contact, Monitor, Probe};
use crate::plugins::{NotificationRegistry, ProbeTypeRegistry};

pub struct AppState {
    pub directory: Arc<dyn Directory>,
    pub mapi: Arc<dyn MachineInfoApi>,
    pub accounts: Arc<dyn AccountService>,
    pub authz_cache: AuthzCache,
    pub probe_types: Arc<ProbeTypeRegistry>,
    pub notifications: Arc<NotificationRegistry>,

    contact_get: TtlLruCache<String, Result<Contact, AmonError>>,
    contact_list: TtlLruCache<String, Result<Vec<Contact>, AmonError>>,
    monitor_get: TtlLruCache<String, Result<Monitor, AmonError>>,
    monitor_list: TtlLruCache<String, Result<Vec<Monitor>, AmonError>>,
    probe_get: TtlLruCache<String, Result<Probe, AmonError>>,
    probe_list: TtlLruCache<String, Result<Vec<Probe>, AmonError>>,

    /// `POST /events` de-duplication window, keyed by `event.uuid` (spec §4.E
    /// "idempotent on event.uuid: replays within a de-duplication window
    /// yield the same outcome"). Reuses the same bounded TTL+LRU cache the
    /// rest of this crate uses for everything else.
    events_seen: TtlLruCache<String, ()>,
}

/// Small helper: returns the fresh result, caching it unless it's the one
/// kind the cache must never hold (spec §4.C).
async fn cached<T, F, Fut>(cache: &TtlLruCache<String, Result<T, AmonError>>, key: &str, load: F) -> Result<T, AmonError>
where
    T: Clone,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, AmonError>>,
{
    if let Some(hit) = cache.get(&key.to_string()) {
        return hit;
    }
    let result = load().await;
    if !result.as_ref().err().map(AmonError::is_unavailable).unwrap_or(false) {
        cache.put(key.to_string(), result.clone());
    }
    result
}

impl AppState {
    pub fn new(
        config: &MasterConfig,
        directory: Arc<dyn Directory>,
        mapi: Arc<dyn MachineInfoApi>,
        accounts: Arc<dyn AccountService>,
        probe_types: Arc<ProbeTypeRegistry>,
        notifications: Arc<NotificationRegistry>,
    ) -> Self {
        let probe_ttl = config.probe_cache.expiry;
        let probe_size = config.probe_cache.size;
        let account_ttl = config.account_cache.expiry;
        let account_size = config.account_cache.size;

        Self {
            directory,
            mapi,
            accounts,
            authz_cache: AuthzCache::new(account_size, account_ttl),
            probe_types,
            notifications,
            contact_get: TtlLruCache::new(probe_size, probe_ttl),
            contact_list: TtlLruCache::new(probe_size, probe_ttl),
            monitor_get: TtlLruCache::new(probe_size, probe_ttl),
            monitor_list: TtlLruCache::new(probe_size, probe_ttl),
            probe_get: TtlLruCache::new(probe_size, probe_ttl),
            probe_list: TtlLruCache::new(probe_size, probe_ttl),
            events_seen: TtlLruCache::new(probe_size, Duration::from_secs(600)),
        }
    }

    /// Returns `true` and marks `uuid` seen the first time it's observed
    /// within the de-duplication window; `false` on a replay (spec §4.E).
    pub fn mark_event_seen(&self, uuid: &str) -> bool {
        if self.events_seen.get(&uuid.to_string()).is_some() {
            return false;
        }
        self.events_seen.put(uuid.to_string(), ());
        true
    }

    // ---- Contact ----

    pub async fn get_contact(&self, user: &str, name: &str) -> Result<Contact, AmonError> {
        let entity_dn = dn::contact_dn(user, name);
        cached(&self.contact_get, &entity_dn, || async {
            let entry = self.directory.get(&entity_dn).await?;
            Contact::from_directory(&entry)
        })
        .await
    }

    pub async fn list_contacts(&self, user: &str) -> Result<Vec<Contact>, AmonError> {
        let parent = dn::contact_parent_dn(user);
        cached(&self.contact_list, &parent, || async {
            let entries = self
                .directory
                .search(&parent, SearchOpts::one_level(&format!("(objectclass={})", crate::model::contact::OBJECTCLASS)))
                .await?;
            entries.iter().map(Contact::from_directory).collect()
        })
        .await
    }

    pub async fn put_contact(&self, contact: &Contact) -> Result<(), AmonError> {
        let attrs = contact.to_directory_attrs();
        match self.directory.add(&contact.dn, attrs.clone()).await {
            Ok(()) => {}
            Err(AmonError::InvalidArgument(_)) => self.directory.modify(&contact.dn, attrs).await?,
            Err(e) => return Err(e),
        }
        self.contact_get.invalidate(&contact.dn);
        self.contact_list.invalidate(&dn::contact_parent_dn(&contact.user));
        Ok(())
    }

    pub async fn delete_contact(&self, user: &str, name: &str) -> Result<(), AmonError> {
        let entity_dn = dn::contact_dn(user, name);
        self.directory.get(&entity_dn).await?; // bypass cache, confirm it exists (spec §4.C)
        self.directory.delete(&entity_dn).await?;
        self.contact_get.invalidate(&entity_dn);
        self.contact_list.invalidate(&dn::contact_parent_dn(user));
        Ok(())
    }

    // ---- Monitor ----

    pub async fn get_monitor(&self, user: &str, name: &str) -> Result<Monitor, AmonError> {
        let entity_dn = dn::monitor_dn(user, name);
        cached(&self.monitor_get, &entity_dn, || async {
            let entry = self.directory.get(&entity_dn).await?;
            Monitor::from_directory(&entry)
        })
        .await
    }

    pub async fn list_monitors(&self, user: &str) -> Result<Vec<Monitor>, AmonError> {
        let parent = dn::monitor_parent_dn(user);
        cached(&self.monitor_list, &parent, || async {
            let entries = self
                .directory
                .search(&parent, SearchOpts::one_level(&format!("(objectclass={})", crate::model::monitor::OBJECTCLASS)))
                .await?;
            entries.iter().map(Monitor::from_directory).collect()
        })
        .await
    }

    pub async fn put_monitor(&self, monitor: &Monitor) -> Result<(), AmonError> {
        let attrs = monitor.to_directory_attrs();
        match self.directory.add(&monitor.dn, attrs.clone()).await {
            Ok(()) => {}
            Err(AmonError::InvalidArgument(_)) => self.directory.modify(&monitor.dn, attrs).await?,
            Err(e) => return Err(e),
        }
        self.monitor_get.invalidate(&monitor.dn);
        self.monitor_list.invalidate(&dn::monitor_parent_dn(&monitor.user));
        Ok(())
    }

    /// Spec §9: cascading delete of Monitor -> Probes is rejected while
    /// child probes exist (`409 Constraint`), Amon's chosen option (a).
    pub async fn delete_monitor(&self, user: &str, name: &str) -> Result<(), AmonError> {
        let entity_dn = dn::monitor_dn(user, name);
        self.directory.get(&entity_dn).await?;

        let children = self
            .directory
            .search(&entity_dn, SearchOpts::one_level(&format!("(objectclass={})", crate::model::probe::OBJECTCLASS)))
            .await?;
        if !children.is_empty() {
            return Err(AmonError::Constraint(format!(
                "monitor {name} still has {} probe(s); delete them first",
                children.len()
            )));
        }

        self.directory.delete(&entity_dn).await?;
        self.monitor_get.invalidate(&entity_dn);
        self.monitor_list.invalidate(&dn::monitor_parent_dn(user));
        Ok(())
    }

    // ---- Probe ----

    pub async fn get_probe(&self, user: &str, monitor: &str, name: &str) -> Result<Probe, AmonError> {
        let entity_dn = dn::probe_dn(user, monitor, name);
        cached(&self.probe_get, &entity_dn, || async {
            let entry = self.directory.get(&entity_dn).await?;
            Probe::from_directory(&entry, &self.probe_types)
        })
        .await
    }

    pub async fn list_probes(&self, user: &str, monitor: &str) -> Result<Vec<Probe>, AmonError> {
        let parent = dn::probe_parent_dn(user, monitor);
        cached(&self.probe_list, &parent, || async {
            let entries = self
                .directory
                .search(&parent, SearchOpts::one_level(&format!("(objectclass={})", crate::model::probe::OBJECTCLASS)))
                .await?;
            entries.iter().map(|e| Probe::from_directory(e, &self.probe_types)).collect()
        })
        .await
    }

    /// All probes across every account whose target matches `target`
    /// (machine uuid or server uuid) — what the relay polls for (spec §4.D
    /// `GET /agentprobes`). Not indexed separately in the directory per
    /// spec; this walks the subtree under the accounts branch and filters,
    /// matching an LDAP subtree search by attribute rather than a SQL index.
    pub async fn list_probes_for_target(
        &self,
        target_attr: &str,
        target_uuid: &str,
    ) -> Result<Vec<Probe>, AmonError> {
        let entries = self
            .directory
            .search(
                dn::BASE_DN,
                SearchOpts {
                    filter: format!("(&(objectclass={})({target_attr}={target_uuid}))", crate::model::probe::OBJECTCLASS),
                    scope: Scope::Subtree,
                },
            )
            .await?;
        entries
            .iter()
            .map(|e| Probe::from_directory(e, &self.probe_types))
            .collect()
    }

    pub async fn put_probe(&self, probe: &Probe) -> Result<(), AmonError> {
        let attrs = probe.to_directory_attrs();
        match self.directory.add(&probe.dn, attrs.clone()).await {
            Ok(()) => {}
            Err(AmonError::InvalidArgument(_)) => self.directory.modify(&probe.dn, attrs).await?,
            Err(e) => return Err(e),
        }
        self.probe_get.invalidate(&probe.dn);
        self.probe_list.invalidate(&dn::probe_parent_dn(&probe.user, &probe.monitor));
        Ok(())
    }

    pub async fn delete_probe(&self, user: &str, monitor: &str, name: &str) -> Result<Probe, AmonError> {
        let entity_dn = dn::probe_dn(user, monitor, name);
        let entry = self.directory.get(&entity_dn).await?;
        let probe = Probe::from_directory(&entry, &self.probe_types)?;
        self.directory.delete(&entity_dn).await?;
        self.probe_get.invalidate(&entity_dn);
        self.probe_list.invalidate(&dn::probe_parent_dn(user, monitor));
        Ok(probe)
    }
}
