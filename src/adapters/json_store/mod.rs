//! Flat JSON document stores.
//!
//! Every mutation reads the whole document, changes it in memory and
//! writes it back through a temp file renamed over the target, so a failed
//! write leaves the previous document intact.

pub mod inbox_repository;
pub mod taxonomy_repository;

pub use inbox_repository::JsonInboxRepository;
pub use taxonomy_repository::JsonTaxonomyRepository;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::domain::errors::{DomainError, DomainResult};

/// Read and decode a document. `Ok(None)` when the file does not exist.
pub async fn read_document<T: DeserializeOwned>(path: &Path) -> DomainResult<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(DomainError::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };
    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        DomainError::Serialization(format!("malformed document {}: {e}", path.display()))
    })
}

/// Serialize → temp file → fsync → rename over `path`.
pub async fn write_document<T: Serialize + ?Sized>(path: &Path, value: &T) -> DomainResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(value)?;

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
    }
    tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
        DomainError::Storage(format!("failed to replace {}: {e}", path.display()))
    })
}

/// Domain names become file names; keep them to a safe alphabet.
pub fn validate_domain(domain: &str) -> DomainResult<()> {
    let valid = !domain.is_empty()
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DomainError::ValidationFailed(format!(
            "invalid domain name '{domain}': use letters, digits, '-' or '_'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_document_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let value: Option<Vec<String>> = read_document(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        write_document(&path, &vec!["a", "b"]).await.unwrap();
        let value: Option<Vec<String>> = read_document(&path).await.unwrap();

        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_malformed_document_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = read_document::<Vec<String>>(&path).await.unwrap_err();
        assert!(matches!(err, DomainError::Serialization(_)));
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("hr").is_ok());
        assert!(validate_domain("tax_2024-cn").is_ok());
        assert!(validate_domain("").is_err());
        assert!(validate_domain("../etc").is_err());
        assert!(validate_domain("a b").is_err());
    }
}
