//! Content-addressed file storage
//!
//! Jobs refer to executables, inputs and reference outputs by digest. The
//! pipeline fetches them through [`Storage`] and stores the contestant's
//! output back when asked to.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::storage::local::LocalStorage;

mod local;

/// Opaque identifier of a stored file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Digest {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file {0} not found in storage")]
    NotFound(Digest),

    #[error("invalid digest: {0:?}")]
    InvalidDigest(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read and write access to content-addressed files
pub trait Storage: Send + Sync {
    fn fetch(&self, digest: &Digest) -> impl Future<Output = Result<Vec<u8>, StorageError>> + Send;

    /// Store `content` and return its digest. `description` is only used for logging.
    fn store(
        &self,
        content: &[u8],
        description: &str,
    ) -> impl Future<Output = Result<Digest, StorageError>> + Send;
}
