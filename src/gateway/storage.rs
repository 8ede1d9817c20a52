//! Local-directory document store with content-addressed file names.

use super::{DocumentStore, StorageError};
use crate::domain::{ContractId, StoredFile};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
    base_url: String,
}

impl LocalDocumentStore {
    /// `base_url` defaults to a `file://` URL of `root`.
    pub fn new(root: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        let root = root.into();
        let base_url = base_url
            .unwrap_or_else(|| format!("file://{}", root.display()))
            .trim_end_matches('/')
            .to_string();
        Self { root, base_url }
    }

    fn sanitize(file_name: &str) -> Result<String, StorageError> {
        let cleaned: String = file_name
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
            return Err(StorageError::InvalidName(file_name.to_string()));
        }
        Ok(cleaned)
    }

    fn resolve(&self, external_id: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(external_id);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidName(external_id.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn store(
        &self,
        contract_id: &ContractId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let name = Self::sanitize(file_name)?;
        let digest = hex::encode(&Sha256::digest(bytes)[..12]);
        let external_id = format!("{}/{}-{}", contract_id, digest, name);

        let path = self.resolve(&external_id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(external_id = %external_id, size = bytes.len(), "document stored");

        Ok(StoredFile {
            url: format!("{}/{}", self.base_url, external_id),
            external_id,
        })
    }

    async fn delete(&self, external_id: &str) -> Result<(), StorageError> {
        let path = self.resolve(external_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(external_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalDocumentStore::new(dir.path(), Some("https://files.test/".into()));
        let contract = ContractId::generate();

        let stored = store.store(&contract, "pay slip.pdf", b"hello").await.unwrap();
        assert!(stored.external_id.starts_with(&contract.to_string()));
        assert!(stored.external_id.ends_with("-pay_slip.pdf"));
        assert_eq!(stored.url, format!("https://files.test/{}", stored.external_id));
        assert!(dir.path().join(&stored.external_id).exists());

        store.delete(&stored.external_id).await.unwrap();
        assert!(!dir.path().join(&stored.external_id).exists());
        assert!(matches!(
            store.delete(&stored.external_id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_same_content_same_id() {
        let dir = TempDir::new().unwrap();
        let store = LocalDocumentStore::new(dir.path(), None);
        let contract = ContractId::generate();
        let a = store.store(&contract, "a.txt", b"same").await.unwrap();
        let b = store.store(&contract, "a.txt", b"same").await.unwrap();
        assert_eq!(a.external_id, b.external_id);
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = LocalDocumentStore::new(dir.path(), None);
        assert!(matches!(
            store.delete("../etc/passwd").await,
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            store.store(&ContractId::generate(), "..", b"x").await,
            Err(StorageError::InvalidName(_))
        ));
    }
}
