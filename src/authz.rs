//! Authorization rules (spec §4.C "Probe PUT") plus the scoped read cache
//! that sits in front of them. Reads go through the cache; writes never do
//! (spec invariant 4) — callers authorize directly against the directory
//! and machine-info adapters, then invalidate the relevant cache entries.

use std::future::Future;
use std::time::Duration;

use crate::account::AccountService;
use crate::cache::TtlLruCache;
use crate::directory::Directory;
use crate::error::AmonError;
use crate::mapi::MachineInfoApi;
use crate::model::probe::ProbePublicForm;
use crate::model::Probe;

pub const OPERATORS_GROUP_DN: &str = "cn=operators, ou=groups, o=smartdc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    AccountByLogin,
    MonitorGet,
    MonitorList,
    ContactGet,
    ContactList,
    ProbeGet,
    ProbeList,
    MachineOwnership,
    OperatorStatus,
    ServerExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(pub CacheScope, pub String);

/// One bounded TTL+LRU cache (spec §4.C), keyed by `(scope, key)`, storing
/// `bool` answers for everything the authorizer asks. Negative results are
/// cached like positive ones — `Unavailable` is the single kind this cache
/// must never hold, so the directory/mapi errors that produce it are
/// handled by the caller before anything reaches `get_or_load`.
pub struct AuthzCache {
    inner: TtlLruCache<CacheKey, Result<bool, AmonError>>,
    accounts: TtlLruCache<CacheKey, Result<String, AmonError>>,
}

impl AuthzCache {
    pub fn new(size: usize, ttl: Duration) -> Self {
        Self {
            inner: TtlLruCache::new(size, ttl),
            accounts: TtlLruCache::new(size, ttl),
        }
    }

    pub async fn bool_scope<F, Fut>(&self, scope: CacheScope, key: &str, load: F) -> Result<bool, AmonError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, AmonError>>,
    {
        let cache_key = CacheKey(scope, key.to_string());
        if let Some(hit) = self.inner.get(&cache_key) {
            return hit;
        }
        let result = load().await;
        if !result.as_ref().err().map(AmonError::is_unavailable).unwrap_or(false) {
            self.inner.put(cache_key, result.clone());
        }
        result
    }

    pub async fn account_by_login<F, Fut>(&self, login: &str, load: F) -> Result<String, AmonError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, AmonError>>,
    {
        let cache_key = CacheKey(CacheScope::AccountByLogin, login.to_string());
        if let Some(hit) = self.accounts.get(&cache_key) {
            return hit;
        }
        let result = load().await;
        if !result.as_ref().err().map(AmonError::is_unavailable).unwrap_or(false) {
            self.accounts.put(cache_key, result.clone());
        }
        result
    }

    /// Invalidates a single-entity `Get` cache entry by DN (spec §4.C).
    pub fn invalidate_get(&self, scope: CacheScope, dn: &str) {
        self.inner.invalidate(&CacheKey(scope, dn.to_string()));
    }

    /// Invalidates a parent-DN `List` cache entry (spec §4.C).
    pub fn invalidate_list(&self, scope: CacheScope, parent_dn: &str) {
        self.inner.invalidate(&CacheKey(scope, parent_dn.to_string()));
    }
}

/// Checks membership of `account_dn` in the fixed `operators` group
/// (spec §4.C: "Operator status is determined by membership of the
/// account's DN in a fixed `operators` group").
pub async fn is_operator(
    directory: &dyn Directory,
    cache: &AuthzCache,
    account_uuid: &str,
    account_dn: &str,
) -> Result<bool, AmonError> {
    cache
        .bool_scope(CacheScope::OperatorStatus, account_uuid, || async {
            // `groupOfNames` carries `member` on the group entry itself, not
            // on any child — a base-scope read of the group DN, not a
            // one-level search below it.
            let group = match directory.get(OPERATORS_GROUP_DN).await {
                Ok(entry) => entry,
                Err(AmonError::ResourceNotFound(_)) => return Ok(false),
                Err(e) => return Err(e),
            };
            Ok(group.attr_many("member").iter().any(|d| d == account_dn))
        })
        .await
}

/// Spec §4.C "Authorization rules (Probe PUT)": exactly one of three cases
/// authorizes a probe PUT; anything else is `InvalidArgument`.
pub async fn authorize_probe_put(
    directory: &dyn Directory,
    mapi: &dyn MachineInfoApi,
    cache: &AuthzCache,
    account_uuid: &str,
    account_dn: &str,
    form: &ProbePublicForm,
    probe_type_is_global: bool,
) -> Result<(), AmonError> {
    let operator = is_operator(directory, cache, account_uuid, account_dn).await?;

    if let Some(machine) = &form.machine {
        let owned = cache
            .bool_scope(CacheScope::MachineOwnership, &format!("{account_uuid}:{machine}"), || {
                mapi.machine_owned_by(account_uuid, machine)
            })
            .await?;
        if owned {
            return Ok(()); // rule 1
        }

        if probe_type_is_global && operator {
            let exists = cache
                .bool_scope(CacheScope::MachineOwnership, &format!("exists:{machine}"), || {
                    mapi.machine_exists(machine)
                })
                .await?;
            if exists {
                return Ok(()); // rule 3: operator-imposed global-zone monitoring
            }
        }

        return Err(AmonError::InvalidArgument(format!(
            "account does not own machine {machine} and is not an operator authorized for global-zone monitoring of it"
        )));
    }

    if let Some(server) = &form.server {
        if !operator {
            return Err(AmonError::InvalidArgument(
                "only an operator may target a probe at a server".to_string(),
            ));
        }
        let exists = cache
            .bool_scope(CacheScope::ServerExists, server, || mapi.server_exists(server))
            .await?;
        if exists {
            return Ok(()); // rule 2
        }
        return Err(AmonError::InvalidArgument(format!("no such server: {server}")));
    }

    // Neither machine nor server set: the object-model validator (§4.B)
    // already rejects this before authorization is ever reached, but a
    // defensive InvalidArgument keeps this function correct standalone.
    Err(AmonError::InvalidArgument(
        "exactly one of machine or server is required".to_string(),
    ))
}

/// Spec §9 "Authorization of probe DELETE": same rule as PUT applied to the
/// *currently stored* probe, except operators may always delete regardless
/// of ownership — PUT's rule 3 additionally requires the probe type be
/// `runInGlobal`, but a DELETE by an operator needs no such qualifier.
pub async fn authorize_probe_delete(
    directory: &dyn Directory,
    mapi: &dyn MachineInfoApi,
    cache: &AuthzCache,
    account_uuid: &str,
    account_dn: &str,
    probe: &Probe,
) -> Result<(), AmonError> {
    if is_operator(directory, cache, account_uuid, account_dn).await? {
        return Ok(());
    }

    if let Some(machine) = &probe.machine {
        let owned = cache
            .bool_scope(CacheScope::MachineOwnership, &format!("{account_uuid}:{machine}"), || {
                mapi.machine_owned_by(account_uuid, machine)
            })
            .await?;
        if owned {
            return Ok(());
        }
        return Err(AmonError::InvalidArgument(format!(
            "account does not own machine {machine} and is not an operator"
        )));
    }

    Err(AmonError::InvalidArgument(
        "only an operator may delete a probe targeted at a server".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectory;
    use crate::mapi::FakeMachineInfoApi;
    use crate::model::dn;
    use std::collections::HashMap;

    fn cache() -> AuthzCache {
        AuthzCache::new(128, Duration::from_secs(60))
    }

    fn probe_form(machine: Option<&str>, server: Option<&str>) -> ProbePublicForm {
        ProbePublicForm {
            name: "p".to_string(),
            user: "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string(),
            monitor: "m".to_string(),
            probe_type: "logscan".to_string(),
            machine: machine.map(str::to_string),
            server: server.map(str::to_string),
            config: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn rule1_owner_is_authorized() {
        let directory = MemoryDirectory::new();
        let mut mapi = FakeMachineInfoApi::default();
        let account = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";
        let machine = "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb";
        mapi.owned_machines.insert((account.to_string(), machine.to_string()));

        let result = authorize_probe_put(
            &directory,
            &mapi,
            &cache(),
            account,
            &dn::account_dn(account),
            &probe_form(Some(machine), None),
            false,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn non_owner_non_operator_is_rejected() {
        let directory = MemoryDirectory::new();
        let mapi = FakeMachineInfoApi::default();
        let account = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";
        let machine = "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb";

        let result = authorize_probe_put(
            &directory,
            &mapi,
            &cache(),
            account,
            &dn::account_dn(account),
            &probe_form(Some(machine), None),
            false,
        )
        .await;
        assert!(matches!(result, Err(AmonError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn rule3_operator_global_zone_monitoring_of_unowned_machine() {
        let directory = MemoryDirectory::new();
        let account = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";
        let machine = "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb";
        directory
            .add(
                OPERATORS_GROUP_DN,
                HashMap::from([
                    ("objectclass".to_string(), vec!["groupofnames".to_string()]),
                    ("member".to_string(), vec![dn::account_dn(account)]),
                ]),
            )
            .await
            .unwrap();

        let mut mapi = FakeMachineInfoApi::default();
        mapi.known_machines.insert(machine.to_string());

        let result = authorize_probe_put(
            &directory,
            &mapi,
            &cache(),
            account,
            &dn::account_dn(account),
            &probe_form(Some(machine), None),
            true,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn rule2_non_operator_server_probe_rejected() {
        let directory = MemoryDirectory::new();
        let mapi = FakeMachineInfoApi::default();
        let account = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";
        let server = "cccccccc-cccc-cccc-cccc-cccccccccccc";

        let result = authorize_probe_put(
            &directory,
            &mapi,
            &cache(),
            account,
            &dn::account_dn(account),
            &probe_form(None, Some(server)),
            false,
        )
        .await;
        assert!(matches!(result, Err(AmonError::InvalidArgument(_))));
    }
}
