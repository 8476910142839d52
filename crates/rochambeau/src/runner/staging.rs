use thiserror::Error;
use tracing::{debug, instrument};

use crate::sandbox::{Sandbox, SandboxError};
use crate::storage::{Digest, Storage, StorageError};

/// A stored file to place in the sandbox under `name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    pub digest: Digest,
    pub executable: bool,
}

impl StagedFile {
    pub fn executable(name: impl Into<String>, digest: Digest) -> Self {
        Self {
            name: name.into(),
            digest,
            executable: true,
        }
    }

    pub fn data(name: impl Into<String>, digest: Digest) -> Self {
        Self {
            name: name.into(),
            digest,
            executable: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to fetch {name} ({digest}) from storage: {source}")]
    Fetch {
        name: String,
        digest: Digest,
        #[source]
        source: StorageError,
    },

    #[error("failed to store {name}: {source}")]
    Store {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("sandbox error while staging {name}: {source}")]
    Sandbox {
        name: String,
        #[source]
        source: SandboxError,
    },
}

/// Fetch each file from storage and write it into the sandbox
///
/// Stops at the first failure.
#[instrument(skip_all, fields(files = files.len()))]
pub async fn stage_files<S, T>(sandbox: &S, storage: &T, files: &[StagedFile]) -> Result<(), StagingError>
where
    S: Sandbox,
    T: Storage,
{
    for file in files {
        let content = storage
            .fetch(&file.digest)
            .await
            .map_err(|source| StagingError::Fetch {
                name: file.name.clone(),
                digest: file.digest.clone(),
                source,
            })?;

        sandbox
            .write_file(&file.name, &content, file.executable)
            .await
            .map_err(|source| StagingError::Sandbox {
                name: file.name.clone(),
                source,
            })?;

        debug!(name = %file.name, digest = %file.digest, executable = file.executable, "staged file");
    }
    Ok(())
}

/// Store a sandbox file, keeping at most `max_bytes` of it
#[instrument(skip(sandbox, storage))]
pub async fn persist_file<S, T>(
    sandbox: &S,
    storage: &T,
    name: &str,
    description: &str,
    max_bytes: usize,
) -> Result<Digest, StagingError>
where
    S: Sandbox,
    T: Storage,
{
    let mut content = sandbox
        .read_file(name)
        .await
        .map_err(|source| StagingError::Sandbox {
            name: name.to_owned(),
            source,
        })?;

    if content.len() > max_bytes {
        debug!(len = content.len(), max_bytes, "truncating file before storing");
        content.truncate(max_bytes);
    }

    storage
        .store(&content, description)
        .await
        .map_err(|source| StagingError::Store {
            name: name.to_owned(),
            source,
        })
}
