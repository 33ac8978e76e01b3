use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AmonError;
use crate::model::{dn, validate_name, validate_uuid, DirectoryEntry};
use crate::plugins::ProbeTypeRegistry;

pub const OBJECTCLASS: &str = "amonprobe";

/// A probe instance: type + target + config (spec §3 "Probe").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    pub name: String,
    pub user: String,
    pub monitor: String,
    #[serde(rename = "type")]
    pub probe_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub config: Value,
    /// Derived, never client-supplied (spec §3). The derived `Serialize`
    /// impl always includes it — this struct's `#[derive]` is only ever
    /// used for the internal (relay-facing manifest) round-trip. The
    /// public HTTP responses go through `serialize(internal: bool)` below,
    /// which is the one place that decides whether `global` is visible.
    pub global: bool,
    #[serde(skip)]
    pub dn: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbePublicForm {
    pub name: String,
    pub user: String,
    pub monitor: String,
    #[serde(rename = "type")]
    pub probe_type: String,
    #[serde(default)]
    pub machine: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default = "default_config")]
    pub config: Value,
}

fn default_config() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Probe {
    pub fn from_public(
        form: ProbePublicForm,
        registry: &ProbeTypeRegistry,
    ) -> Result<Self, AmonError> {
        let target = Self::validate_target(form.machine.as_deref(), form.server.as_deref())?;
        Self::validate_identity(&form.name, &form.user, &form.monitor)?;

        let plugin = registry.get(&form.probe_type).ok_or_else(|| {
            AmonError::InvalidArgument(format!("unknown probe type: {}", form.probe_type))
        })?;
        plugin
            .validate_config(&form.config)
            .map_err(AmonError::InvalidArgument)?;

        let dn = dn::probe_dn(&form.user, &form.monitor, &form.name);
        Ok(Self {
            name: form.name,
            user: form.user,
            monitor: form.monitor,
            probe_type: form.probe_type,
            machine: target.machine,
            server: target.server,
            config: form.config,
            global: plugin.run_in_global(),
            dn,
        })
    }

    pub fn from_directory(
        entry: &DirectoryEntry,
        registry: &ProbeTypeRegistry,
    ) -> Result<Self, AmonError> {
        let (key, name, rest) = dn::split_rdn(&entry.dn)?;
        if key != "probe" {
            return Err(AmonError::InternalError(format!("expected probe= rdn, got {key}=")));
        }
        let (mkey, monitor, rest) = dn::split_rdn(&rest)?;
        if mkey != "monitor" {
            return Err(AmonError::InternalError(format!(
                "expected monitor= rdn above probe, got {mkey}="
            )));
        }
        let user = dn::parse_account(&rest)?;

        let machine = entry.attr_one("machine").map(|s| s.to_string());
        let server = entry.attr_one("server").map(|s| s.to_string());
        Self::validate_target(machine.as_deref(), server.as_deref())?;
        Self::validate_identity(&name, &user, &monitor)?;

        let probe_type = entry.attr_required("type")?.to_string();
        let config: Value = entry
            .attr_one("config")
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| AmonError::InternalError(format!("corrupt probe config json: {e}")))?
            .unwrap_or_else(default_config);

        let plugin = registry.get(&probe_type).ok_or_else(|| {
            AmonError::InternalError(format!("directory record references unknown probe type: {probe_type}"))
        })?;

        Ok(Self {
            name,
            user,
            monitor,
            probe_type,
            machine,
            server,
            config,
            global: plugin.run_in_global(),
            dn: entry.dn.clone(),
        })
    }

    fn validate_identity(name: &str, user: &str, monitor: &str) -> Result<(), AmonError> {
        validate_name("name", name)?;
        validate_uuid("user", user)?;
        validate_name("monitor", monitor)?;
        Ok(())
    }

    /// Spec §3 invariant 2 / §8 scenarios 2-3: exactly one of machine/server.
    fn validate_target(
        machine: Option<&str>,
        server: Option<&str>,
    ) -> Result<Target, AmonError> {
        match (machine, server) {
            (None, None) => Err(AmonError::MissingParameter(
                "exactly one of machine or server is required".to_string(),
            )),
            (Some(_), Some(_)) => Err(AmonError::InvalidArgument(
                "only one of machine or server may be set".to_string(),
            )),
            (Some(m), None) => {
                validate_uuid("machine", m)?;
                Ok(Target {
                    machine: Some(m.to_string()),
                    server: None,
                })
            }
            (None, Some(s)) => {
                validate_uuid("server", s)?;
                Ok(Target {
                    machine: None,
                    server: Some(s.to_string()),
                })
            }
        }
    }

    /// `internal = true` includes `global`, the one field hidden from the
    /// public API (spec §4.B).
    pub fn serialize(&self, internal: bool) -> serde_json::Value {
        let mut value = serde_json::json!({
            "name": self.name,
            "user": self.user,
            "monitor": self.monitor,
            "type": self.probe_type,
            "config": self.config,
        });
        let obj = value.as_object_mut().unwrap();
        if let Some(m) = &self.machine {
            obj.insert("machine".to_string(), serde_json::json!(m));
        }
        if let Some(s) = &self.server {
            obj.insert("server".to_string(), serde_json::json!(s));
        }
        if internal {
            obj.insert("global".to_string(), serde_json::json!(self.global));
        }
        value
    }

    pub fn to_directory_attrs(&self) -> std::collections::HashMap<String, Vec<String>> {
        let mut attrs = std::collections::HashMap::from([
            ("objectclass".to_string(), vec![OBJECTCLASS.to_string()]),
            ("type".to_string(), vec![self.probe_type.clone()]),
            ("config".to_string(), vec![self.config.to_string()]),
        ]);
        if let Some(m) = &self.machine {
            attrs.insert("machine".to_string(), vec![m.clone()]);
        }
        if let Some(s) = &self.server {
            attrs.insert("server".to_string(), vec![s.clone()]);
        }
        attrs
    }

    /// The target this probe is assigned to, for relay manifest partitioning
    /// (spec §4.E: "one per active tenant sandbox... plus the global zone").
    pub fn target(&self) -> ProbeTarget {
        match (&self.machine, &self.server) {
            (Some(m), None) => ProbeTarget::Machine(m.clone()),
            (None, Some(s)) => ProbeTarget::Server(s.clone()),
            _ => unreachable!("Probe::validate_target guarantees exactly one of machine/server"),
        }
    }
}

struct Target {
    machine: Option<String>,
    server: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProbeTarget {
    Machine(String),
    Server(String),
}

impl ProbeTarget {
    pub fn type_and_uuid(&self) -> (&'static str, &str) {
        match self {
            ProbeTarget::Machine(uuid) => ("machine", uuid),
            ProbeTarget::Server(uuid) => ("server", uuid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::probe_type::{EventEmitter, ProbeContext, ProbeInstance, ProbeType};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Stub(bool);

    #[async_trait]
    impl ProbeType for Stub {
        fn run_in_global(&self) -> bool {
            self.0
        }
        fn validate_config(&self, config: &Value) -> Result<(), String> {
            if config.get("path").is_some() {
                Ok(())
            } else {
                Err("missing path".to_string())
            }
        }
        fn new_instance(&self, _config: Value, _context: ProbeContext) -> Arc<dyn ProbeInstance> {
            struct Noop;
            #[async_trait]
            impl ProbeInstance for Noop {
                async fn run_once(&self, _emit: &dyn EventEmitter) -> Result<(), AmonError> {
                    Ok(())
                }
            }
            Arc::new(Noop)
        }
    }

    fn registry() -> ProbeTypeRegistry {
        let mut r = ProbeTypeRegistry::new();
        r.register("logscan", Arc::new(Stub(false)));
        r.register("machine-up", Arc::new(Stub(true)));
        r
    }

    fn base_form() -> ProbePublicForm {
        ProbePublicForm {
            name: "whistlelog".to_string(),
            user: "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string(),
            monitor: "whistle".to_string(),
            probe_type: "logscan".to_string(),
            machine: Some("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb".to_string()),
            server: None,
            config: serde_json::json!({"path": "/tmp/whistle.log"}),
        }
    }

    #[test]
    fn rejects_missing_target() {
        let mut form = base_form();
        form.machine = None;
        let err = Probe::from_public(form, &registry()).unwrap_err();
        assert!(matches!(err, AmonError::MissingParameter(_)));
    }

    #[test]
    fn rejects_both_targets() {
        let mut form = base_form();
        form.server = Some("cccccccc-cccc-cccc-cccc-cccccccccccc".to_string());
        let err = Probe::from_public(form, &registry()).unwrap_err();
        assert!(matches!(err, AmonError::InvalidArgument(_)));
    }

    #[test]
    fn p3_global_matches_plugin_run_in_global() {
        let mut form = base_form();
        form.probe_type = "machine-up".to_string();
        let probe = Probe::from_public(form, &registry()).unwrap();
        assert!(probe.global);
    }

    #[test]
    fn p1_exactly_one_of_machine_server() {
        let probe = Probe::from_public(base_form(), &registry()).unwrap();
        assert!(probe.machine.is_some() ^ probe.server.is_some());
    }

    #[test]
    fn internal_serialize_includes_global_public_does_not() {
        let probe = Probe::from_public(base_form(), &registry()).unwrap();
        let public = probe.serialize(false);
        let internal = probe.serialize(true);
        assert!(public.get("global").is_none());
        assert_eq!(internal.get("global").unwrap(), false);
    }

    #[test]
    fn p2_directory_roundtrip() {
        let probe = Probe::from_public(base_form(), &registry()).unwrap();
        let entry = DirectoryEntry {
            dn: probe.dn.clone(),
            attrs: probe.to_directory_attrs(),
        };
        let reloaded = Probe::from_directory(&entry, &registry()).unwrap();
        assert_eq!(probe.serialize(true), reloaded.serialize(true));
    }
}
