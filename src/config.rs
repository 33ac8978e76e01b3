//! Configuration (spec §6). Loaded from environment variables via
//! `dotenvy`, the same way the teacher's `main.rs` calls
//! `dotenvy::dotenv()` before reading `std::env::var` — no config file
//! parser is introduced; env vars are the whole surface, grouped into
//! typed structs per binary.

use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct UfdsConfig {
    pub url: String,
    pub root_dn: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct MapiConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AccountsConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub size: usize,
    pub expiry: Duration,
}

/// Master config (spec §6: `port`, `ufds.*`, `mapi.*`,
/// `notificationPlugins.*`, `accountCache.*`, `probeCache.*`).
#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub port: u16,
    pub ufds: UfdsConfig,
    pub mapi: MapiConfig,
    pub accounts: AccountsConfig,
    pub account_cache: CacheConfig,
    pub probe_cache: CacheConfig,
}

impl MasterConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            port: env_u64("PORT", 8080) as u16,
            ufds: UfdsConfig {
                url: env_or("UFDS_URL", "ldap://127.0.0.1:389"),
                root_dn: env_or("UFDS_ROOT_DN", "cn=root"),
                password: env_or("UFDS_PASSWORD", ""),
            },
            mapi: MapiConfig {
                url: env_or("MAPI_URL", "http://127.0.0.1:8081"),
            },
            accounts: AccountsConfig {
                url: env_or("ACCOUNTS_URL", "http://127.0.0.1:8082"),
            },
            account_cache: CacheConfig {
                size: env_u64("ACCOUNT_CACHE_SIZE", 1000) as usize,
                expiry: Duration::from_secs(env_u64("ACCOUNT_CACHE_EXPIRY_SECS", 300)),
            },
            probe_cache: CacheConfig {
                size: env_u64("PROBE_CACHE_SIZE", 5000) as usize,
                expiry: Duration::from_secs(env_u64("PROBE_CACHE_EXPIRY_SECS", 60)),
            },
        }
    }
}

/// Relay config — not named in spec.md's (Master-only) table, but a
/// process needs it to run (SPEC_FULL.md §6). `targets` is the fixed set of
/// tenant machines (plus the one global-zone server) this relay instance
/// serves (spec §4.E "each relay serves N targets"); a real deployment
/// would learn this set from the node's own zone list, which is outside
/// this crate's scope, so it is read from configuration instead.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub master_url: String,
    pub data_dir: std::path::PathBuf,
    pub socket_dir: std::path::PathBuf,
    pub poll_interval: Duration,
    pub targets: Vec<crate::model::probe::ProbeTarget>,
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            master_url: env_or("RELAY_MASTER_URL", "http://127.0.0.1:8080"),
            data_dir: std::path::PathBuf::from(env_or("RELAY_DATA_DIR", "./relay-data")),
            socket_dir: std::path::PathBuf::from(env_or("RELAY_SOCKET_DIR", "./relay-sockets")),
            poll_interval: Duration::from_secs(env_u64("RELAY_POLL_INTERVAL_SECS", 30)),
            targets: parse_targets(&env_or("RELAY_TARGETS", "")),
        }
    }

    /// The per-target Unix socket an agent on `target` connects to (spec
    /// §4.E: "relays reach their agents over a per-sandbox local socket").
    pub fn socket_path(&self, target: &crate::model::probe::ProbeTarget) -> std::path::PathBuf {
        let (kind, uuid) = target.type_and_uuid();
        self.socket_dir.join(format!("{kind}-{uuid}.sock"))
    }
}

/// Parses `RELAY_TARGETS` as a comma-separated list of `machine:<uuid>` or
/// `server:<uuid>` entries. Malformed entries are skipped with a warning
/// rather than failing startup — one bad entry in the list shouldn't keep
/// the relay from serving the rest of its targets.
fn parse_targets(raw: &str) -> Vec<crate::model::probe::ProbeTarget> {
    use crate::model::probe::ProbeTarget;

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| match entry.split_once(':') {
            Some(("machine", uuid)) => Some(ProbeTarget::Machine(uuid.to_string())),
            Some(("server", uuid)) => Some(ProbeTarget::Server(uuid.to_string())),
            _ => {
                tracing::warn!(entry, "ignoring malformed RELAY_TARGETS entry");
                None
            }
        })
        .collect()
}

/// Agent config — same rationale as `RelayConfig`. `relay_socket` is the
/// per-sandbox Unix socket the agent's relay listens on for this target
/// (spec §4.E: "relays reach their agents over a per-sandbox local
/// socket").
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub relay_socket: std::path::PathBuf,
    pub poll_interval: Duration,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            relay_socket: std::path::PathBuf::from(env_or("AGENT_RELAY_SOCKET", "/var/run/amon-relay.sock")),
            poll_interval: Duration::from_secs(env_u64("AGENT_POLL_INTERVAL_SECS", 15)),
        }
    }
}
