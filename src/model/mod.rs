//! Object model & validator (spec §4.B).
//!
//! Each entity type (`Contact`, `Monitor`, `Probe`) is constructed either
//! from a public-form payload (what a client PUTs) or a directory-native
//! form (what comes back from a directory search), validated once in
//! either path, and serialized back out in a public or internal shape.
//!
//! Per spec §9's design note on "dual-shape constructors", Amon takes the
//! *preferred* option there: two named constructors, `from_public` and
//! `from_directory`, sharing one private validator. There is no tagged
//! enum and no `objectclass`-sniffing dispatch at the call site.

pub mod contact;
pub mod dn;
pub mod monitor;
pub mod probe;

pub use contact::Contact;
pub use monitor::Monitor;
pub use probe::Probe;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AmonError;

/// `^[A-Za-z][A-Za-z0-9_.-]{0,31}$` — shared by Contact, Monitor, and Probe names (spec §3).
pub static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]{0,31}$").unwrap());

pub static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

pub fn validate_name(field: &str, value: &str) -> Result<(), AmonError> {
    if value.is_empty() {
        return Err(AmonError::MissingParameter(field.to_string()));
    }
    if !NAME_RE.is_match(value) {
        return Err(AmonError::InvalidArgument(format!(
            "{field} must match {}",
            NAME_RE.as_str()
        )));
    }
    Ok(())
}

pub fn validate_uuid(field: &str, value: &str) -> Result<(), AmonError> {
    if value.is_empty() {
        return Err(AmonError::MissingParameter(field.to_string()));
    }
    if !UUID_RE.is_match(value) {
        return Err(AmonError::InvalidArgument(format!("{field} is not a valid uuid")));
    }
    Ok(())
}

/// A raw directory record: the shape `search()` returns (spec §4.A) —
/// a DN plus its attribute map, values always stored as the directory
/// would hand them back (string or string-array per LDAP convention).
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: std::collections::HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn attr_one(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.first()).map(|s| s.as_str())
    }

    pub fn attr_required(&self, key: &str) -> Result<&str, AmonError> {
        self.attr_one(key)
            .ok_or_else(|| AmonError::InternalError(format!("directory record missing attribute {key}")))
    }

    pub fn attr_many(&self, key: &str) -> Vec<String> {
        self.attrs.get(key).cloned().unwrap_or_default()
    }
}
