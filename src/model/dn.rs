//! Distinguished-name construction and parsing (spec §3, invariant 1).
//!
//! Every entity's DN has the shape `<child>=<id>, <parent-path>, o=smartdc`.
//! The parent path for Contacts and Monitors is the owning account; for
//! Probes it is the owning Monitor. Centralizing the format here means a
//! single place decides the directory's shape — entity modules only ever
//! say *what* key and parent they have, not how a DN string is laid out.

use crate::error::AmonError;

pub const BASE_DN: &str = "o=smartdc";

pub fn account_dn(user: &str) -> String {
    format!("uuid={user}, ou=users, {BASE_DN}")
}

pub fn contact_dn(user: &str, name: &str) -> String {
    format!("contact={name}, {}", account_dn(user))
}

pub fn monitor_dn(user: &str, name: &str) -> String {
    format!("monitor={name}, {}", account_dn(user))
}

pub fn monitor_parent_dn(user: &str) -> String {
    account_dn(user)
}

pub fn contact_parent_dn(user: &str) -> String {
    account_dn(user)
}

pub fn probe_dn(user: &str, monitor: &str, name: &str) -> String {
    format!("probe={name}, {}", monitor_dn(user, monitor))
}

pub fn probe_parent_dn(user: &str, monitor: &str) -> String {
    monitor_dn(user, monitor)
}

/// Splits `"key=value, rest..."` into `(key, value, rest)`. Used by each
/// entity's `parse_dn` to peel off its own RDN before handing the remainder
/// to the parent's parser.
pub fn split_rdn(dn: &str) -> Result<(String, String, String), AmonError> {
    let mut parts = dn.splitn(2, ',');
    let rdn = parts
        .next()
        .ok_or_else(|| AmonError::InvalidArgument(format!("malformed dn: {dn}")))?
        .trim();
    let rest = parts.next().unwrap_or_default().trim().to_string();
    let (key, value) = rdn
        .split_once('=')
        .ok_or_else(|| AmonError::InvalidArgument(format!("malformed rdn: {rdn}")))?;
    Ok((key.trim().to_string(), value.trim().to_string(), rest))
}

/// Extracts the `uuid=<value>` account component from a DN tail such as
/// `"uuid=<user>, ou=users, o=smartdc"`.
pub fn parse_account(rest: &str) -> Result<String, AmonError> {
    let (key, value, _) = split_rdn(rest)?;
    if key != "uuid" {
        return Err(AmonError::InvalidArgument(format!(
            "expected uuid= component in dn tail, got {key}="
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_dn_roundtrip_prefix() {
        let dn = contact_dn("11111111-1111-1111-1111-111111111111", "page-me");
        assert_eq!(
            dn,
            "contact=page-me, uuid=11111111-1111-1111-1111-111111111111, ou=users, o=smartdc"
        );
    }

    #[test]
    fn split_rdn_peels_one_component() {
        let (k, v, rest) = split_rdn("monitor=whistle, uuid=abc, ou=users, o=smartdc").unwrap();
        assert_eq!(k, "monitor");
        assert_eq!(v, "whistle");
        assert_eq!(rest, "uuid=abc, ou=users, o=smartdc");
    }
}
