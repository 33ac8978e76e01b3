use serde::{Deserialize, Serialize};

use crate::error::AmonError;
use crate::model::{dn, validate_name, validate_uuid, DirectoryEntry};

pub const OBJECTCLASS: &str = "amonmonitor";

/// A named bundle of contacts (spec §3 "Monitor").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub name: String,
    pub user: String,
    pub contacts: Vec<String>,
    #[serde(skip)]
    pub dn: String,
}

#[derive(Debug, Deserialize)]
pub struct MonitorPublicForm {
    pub name: String,
    pub user: String,
    #[serde(default)]
    pub contacts: Vec<String>,
}

impl Monitor {
    pub fn from_public(form: MonitorPublicForm) -> Result<Self, AmonError> {
        Self::validate(&form.name, &form.user)?;
        let dn = dn::monitor_dn(&form.user, &form.name);
        Ok(Self {
            name: form.name,
            user: form.user,
            contacts: form.contacts,
            dn,
        })
    }

    pub fn from_directory(entry: &DirectoryEntry) -> Result<Self, AmonError> {
        let (key, name, rest) = dn::split_rdn(&entry.dn)?;
        if key != "monitor" {
            return Err(AmonError::InternalError(format!(
                "expected monitor= rdn, got {key}="
            )));
        }
        let user = dn::parse_account(&rest)?;
        Self::validate(&name, &user)?;
        Ok(Self {
            name,
            user,
            contacts: entry.attr_many("contact"),
            dn: entry.dn.clone(),
        })
    }

    fn validate(name: &str, user: &str) -> Result<(), AmonError> {
        validate_name("name", name)?;
        validate_uuid("user", user)?;
        Ok(())
    }

    pub fn serialize(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "user": self.user,
            "contacts": self.contacts,
        })
    }

    pub fn to_directory_attrs(&self) -> std::collections::HashMap<String, Vec<String>> {
        std::collections::HashMap::from([
            ("objectclass".to_string(), vec![OBJECTCLASS.to_string()]),
            ("contact".to_string(), self.contacts.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contacts_default_to_empty() {
        let form = MonitorPublicForm {
            name: "whistle".to_string(),
            user: "11111111-1111-1111-1111-111111111111".to_string(),
            contacts: vec![],
        };
        let monitor = Monitor::from_public(form).unwrap();
        assert!(monitor.contacts.is_empty());
    }
}
