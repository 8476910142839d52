use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256};
use tracing::{debug, instrument};

use crate::storage::{Digest, Storage, StorageError};

/// Files kept in a directory, named by the lowercase hex SHA-256 of their content
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Digest a file would be stored under
    pub fn digest_of(content: &[u8]) -> Digest {
        Digest::new(format!("{:x}", Sha256::digest(content)))
    }

    fn path_for(&self, digest: &Digest) -> Result<PathBuf, StorageError> {
        let name = digest.as_str();
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(StorageError::InvalidDigest(name.to_owned()));
        }
        Ok(self.root.join(name))
    }
}

impl Storage for LocalStorage {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn fetch(&self, digest: &Digest) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(digest)?;
        match tokio::fs::read(&path).await {
            Ok(content) => {
                debug!(len = content.len(), "fetched file");
                Ok(content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(digest.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, content), fields(len = content.len()))]
    async fn store(&self, content: &[u8], description: &str) -> Result<Digest, StorageError> {
        let digest = Self::digest_of(content);
        let path = self.path_for(&digest)?;

        tokio::fs::create_dir_all(&self.root).await?;
        if tokio::fs::metadata(&path).await.is_err() {
            // Readers only ever see complete files: write aside, then rename over
            let staging = tempfile::Builder::new()
                .prefix(".incoming-")
                .tempfile_in(&self.root)?;
            tokio::fs::write(staging.path(), content).await?;
            staging.persist(&path).map_err(|e| e.error)?;
        }

        debug!(%digest, "stored file");
        Ok(digest)
    }
}
