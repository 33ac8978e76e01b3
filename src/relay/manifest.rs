//! Per-target manifest files on local disk (spec §4.E, §6 "On-disk
//! layout"): `<type>-<uuid>.json` plus its `.content-md5` sidecar, written
//! atomically (write-temp-then-rename) so a reader never observes a
//! partially-written pair (spec P5).

use std::path::{Path, PathBuf};

use crate::error::AmonError;
use crate::model::probe::ProbeTarget;
use crate::wire::content_md5;

pub fn manifest_path(data_dir: &Path, target: &ProbeTarget) -> PathBuf {
    let (kind, uuid) = target.type_and_uuid();
    data_dir.join(format!("{kind}-{uuid}.json"))
}

pub fn content_md5_path(manifest_path: &Path) -> PathBuf {
    let mut name = manifest_path.as_os_str().to_owned();
    name.push(".content-md5");
    PathBuf::from(name)
}

/// Reads the cached manifest body and its recorded content hash. An absent
/// file reads as the empty manifest (spec §4.E: "empty list when file is
/// absent"), not an error — a relay that hasn't synced yet still answers.
pub async fn read_cached(data_dir: &Path, target: &ProbeTarget) -> (Vec<u8>, String) {
    let path = manifest_path(data_dir, target);
    let md5_path = content_md5_path(&path);
    let body = tokio::fs::read(&path).await.unwrap_or_else(|_| b"[]".to_vec());
    let digest = tokio::fs::read_to_string(&md5_path)
        .await
        .unwrap_or_else(|_| content_md5(b"[]"));
    (body, digest)
}

/// Rewrites both files for `target` iff `body`'s content hash differs from
/// what's on disk. Returns whether a write happened, for poll-loop logging.
pub async fn write_if_changed(data_dir: &Path, target: &ProbeTarget, body: &[u8]) -> Result<bool, AmonError> {
    let path = manifest_path(data_dir, target);
    let md5_path = content_md5_path(&path);
    let new_digest = content_md5(body);

    if let Ok(current) = tokio::fs::read_to_string(&md5_path).await {
        if current == new_digest {
            return Ok(false);
        }
    }

    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| AmonError::InternalError(format!("creating relay data dir {}: {e}", data_dir.display())))?;

    // Body first, hash second: a reader that sees the new body under the
    // still-old hash just re-fetches next poll; the reverse order would let
    // an agent cache a stale body under a hash that claims it's current.
    write_atomic(&path, body).await?;
    write_atomic(&md5_path, new_digest.as_bytes()).await?;
    Ok(true)
}

async fn write_atomic(path: &Path, body: &[u8]) -> Result<(), AmonError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, body)
        .await
        .map_err(|e| AmonError::InternalError(format!("writing {}: {e}", tmp_path.display())))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| AmonError::InternalError(format!("renaming {} into place: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_manifest_reads_as_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let target = ProbeTarget::Machine("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string());
        let (body, digest) = read_cached(dir.path(), &target).await;
        assert_eq!(body, b"[]");
        assert_eq!(digest, content_md5(b"[]"));
    }

    #[tokio::test]
    async fn write_if_changed_is_idempotent_on_identical_body() {
        let dir = tempfile::tempdir().unwrap();
        let target = ProbeTarget::Server("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb".to_string());
        let body = br#"[{"name":"p"}]"#;

        assert!(write_if_changed(dir.path(), &target, body).await.unwrap());
        assert!(!write_if_changed(dir.path(), &target, body).await.unwrap());

        let (read_body, digest) = read_cached(dir.path(), &target).await;
        assert_eq!(read_body, body);
        assert_eq!(digest, content_md5(body));
    }

    #[tokio::test]
    async fn write_if_changed_overwrites_on_new_body() {
        let dir = tempfile::tempdir().unwrap();
        let target = ProbeTarget::Machine("cccccccc-cccc-cccc-cccc-cccccccccccc".to_string());

        write_if_changed(dir.path(), &target, b"[1]").await.unwrap();
        assert!(write_if_changed(dir.path(), &target, b"[]").await.unwrap());

        let (body, digest) = read_cached(dir.path(), &target).await;
        assert_eq!(body, b"[]");
        assert_eq!(digest, content_md5(b"[]"));
    }
}
