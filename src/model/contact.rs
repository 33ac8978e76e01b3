use serde::{Deserialize, Serialize};

use crate::error::AmonError;
use crate::model::{dn, validate_name, validate_uuid, DirectoryEntry};

pub const OBJECTCLASS: &str = "amoncontact";

/// A notification endpoint belonging to an account (spec §3 "Contact").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    pub user: String,
    pub medium: String,
    pub data: String,
    #[serde(skip)]
    pub dn: String,
}

/// What a client PUTs at `/pub/:login/contacts/:contact`. Route parameters
/// (`login` -> `user`, `:contact` -> `name`) are merged in by the handler
/// before this ever exists; the payload itself never decides its own identity.
#[derive(Debug, Deserialize)]
pub struct ContactPublicForm {
    pub name: String,
    pub user: String,
    pub medium: String,
    pub data: String,
}

impl Contact {
    pub fn from_public(form: ContactPublicForm) -> Result<Self, AmonError> {
        Self::validate(&form.name, &form.user, &form.medium, &form.data)?;
        let dn = dn::contact_dn(&form.user, &form.name);
        Ok(Self {
            name: form.name,
            user: form.user,
            medium: form.medium,
            data: form.data,
            dn,
        })
    }

    pub fn from_directory(entry: &DirectoryEntry) -> Result<Self, AmonError> {
        let (key, name, rest) = dn::split_rdn(&entry.dn)?;
        if key != "contact" {
            return Err(AmonError::InternalError(format!(
                "expected contact= rdn, got {key}="
            )));
        }
        let user = dn::parse_account(&rest)?;
        let medium = entry.attr_required("medium")?.to_string();
        let data = entry.attr_required("data")?.to_string();
        Self::validate(&name, &user, &medium, &data)?;
        Ok(Self {
            name,
            user,
            medium,
            data,
            dn: entry.dn.clone(),
        })
    }

    fn validate(name: &str, user: &str, medium: &str, data: &str) -> Result<(), AmonError> {
        validate_name("name", name)?;
        validate_uuid("user", user)?;
        if medium.is_empty() {
            return Err(AmonError::MissingParameter("medium".to_string()));
        }
        if data.is_empty() {
            return Err(AmonError::MissingParameter("data".to_string()));
        }
        Ok(())
    }

    /// Public serialization is also the internal one — Contact has no
    /// internal-only field (unlike Probe's `global`).
    pub fn serialize(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "user": self.user,
            "medium": self.medium,
            "data": self.data,
        })
    }

    pub fn to_directory_attrs(&self) -> std::collections::HashMap<String, Vec<String>> {
        std::collections::HashMap::from([
            ("objectclass".to_string(), vec![OBJECTCLASS.to_string()]),
            ("medium".to_string(), vec![self.medium.clone()]),
            ("data".to_string(), vec![self.data.clone()]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> ContactPublicForm {
        ContactPublicForm {
            name: "page-me".to_string(),
            user: "11111111-1111-1111-1111-111111111111".to_string(),
            medium: "email".to_string(),
            data: "ops@example.com".to_string(),
        }
    }

    #[test]
    fn rejects_bad_name() {
        let mut form = valid_form();
        form.name = "1-starts-with-digit".to_string();
        assert!(matches!(
            Contact::from_public(form),
            Err(AmonError::InvalidArgument(_))
        ));
    }

    #[test]
    fn roundtrip_through_directory_form() {
        let contact = Contact::from_public(valid_form()).unwrap();
        let entry = DirectoryEntry {
            dn: contact.dn.clone(),
            attrs: contact.to_directory_attrs(),
        };
        let reloaded = Contact::from_directory(&entry).unwrap();
        assert_eq!(contact.name, reloaded.name);
        assert_eq!(contact.user, reloaded.user);
        assert_eq!(contact.medium, reloaded.medium);
        assert_eq!(contact.data, reloaded.data);
    }
}
