//! Archive of raw webhook payloads for later inspection

use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::Result;

const DIGEST_PREFIX_LEN: usize = 10;

#[derive(Debug, Clone)]
pub struct PayloadArchive {
    directory: PathBuf,
}

impl PayloadArchive {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Write `payload` as pretty JSON and return the file location.
    ///
    /// File names are `<kind>-<timestamp>-<digest>.json`; the digest is taken
    /// over the compact form of the payload.
    pub async fn persist(&self, kind: &str, payload: &Value) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory).await?;

        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%6fZ");
        let digest = hex::encode(Sha256::digest(serde_json::to_vec(payload)?));
        let path = self.directory.join(format!(
            "{}-{}-{}.json",
            kind,
            timestamp,
            &digest[..DIGEST_PREFIX_LEN]
        ));

        fs::write(&path, serde_json::to_string_pretty(payload)?).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn writes_pretty_payload_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = PayloadArchive::new(dir.path().join("hooks"));
        let payload = json!({"object_kind": "issue", "object_attributes": {"iid": 3}});

        let path = archive.persist("issue", &payload).await.unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("issue-"));
        assert!(name.ends_with(".json"));
        let stored: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, payload);
    }

    #[tokio::test]
    async fn same_payload_shares_digest() {
        let dir = tempfile::tempdir().unwrap();
        let archive = PayloadArchive::new(dir.path());

        let a = json!({"a": 1, "b": [true, null]});
        let b = a.clone();
        let digest_of = |p: PathBuf| {
            let name = p.file_stem().unwrap().to_string_lossy().into_owned();
            name.rsplit('-').next().unwrap().to_string()
        };

        let first = digest_of(archive.persist("note", &a).await.unwrap());
        let second = digest_of(archive.persist("note", &b).await.unwrap());
        assert_eq!(first, second);
        assert_eq!(first.len(), DIGEST_PREFIX_LEN);
    }
}
