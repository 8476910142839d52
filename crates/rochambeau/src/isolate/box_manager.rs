//! Box lifecycle management for isolate
//!
//! Manages the initialization, use, and cleanup of Isolate sandbox boxes.

use std::collections::VecDeque;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::process::Command;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};

use crate::isolate::IsolateError;
use crate::isolate::command::{IsolateAction, IsolateCommand};

const EXECUTABLE_MODE: u32 = 0o755;
const DATA_MODE: u32 = 0o644;

/// An initialized isolate box
///
/// Call [`cleanup()`](Self::cleanup) before dropping. `Drop` falls back to a
/// best-effort cleanup on a spawned thread, which may not finish before the
/// process exits.
#[derive(Debug)]
pub struct IsolateBox {
    id: u32,

    /// Path to the box directory reported by `isolate --init`
    box_path: PathBuf,

    isolate_path: PathBuf,

    initialized: bool,

    cgroup: bool,

    /// Pool slot (if acquired from a pool), handed back once the box is cleaned up
    lease: Option<BoxLease>,
}

impl IsolateBox {
    /// Initialize a new isolate box
    #[instrument(skip(isolate_path))]
    pub async fn init(
        id: u32,
        isolate_path: impl Into<PathBuf>,
        cgroup: bool,
    ) -> Result<Self, IsolateError> {
        let isolate_path = isolate_path.into();

        let args = IsolateCommand::new(&isolate_path, id)
            .action(IsolateAction::Init)
            .cgroup(cgroup)
            .build();

        debug!(?args, "initializing isolate box");

        let output = Command::new(&args[0])
            .args(&args[1..])
            .output()
            .await
            .map_err(IsolateError::SpawnFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IsolateError::InitFailed {
                id,
                message: stderr.to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let box_path = PathBuf::from(stdout.trim());

        if !box_path.exists() {
            return Err(IsolateError::InitFailed {
                id,
                message: format!("box path does not exist: {}", box_path.display()),
            });
        }

        debug!(?box_path, "box initialized");

        Ok(Self {
            id,
            box_path,
            isolate_path,
            initialized: true,
            cgroup,
            lease: None,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Get the path to the box directory
    pub fn path(&self) -> &Path {
        &self.box_path
    }

    /// Get the host path to a file inside the box
    ///
    /// Returns an error if the name would escape the box directory.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, IsolateError> {
        check_name(name)?;
        Ok(self.box_path.join("box").join(name))
    }

    /// Get the path of a file as seen from inside the sandbox (`/box/<name>`)
    ///
    /// Isolate opens `--stdin`, `--stdout` and `--stderr` inside the sandbox.
    pub fn sandbox_path(&self, name: &str) -> Result<PathBuf, IsolateError> {
        check_name(name)?;
        Ok(PathBuf::from("/box").join(name))
    }

    /// Get the host path for isolate's meta file, kept outside the sandbox-visible directory
    pub(crate) fn meta_path(&self) -> PathBuf {
        self.box_path.join("meta.txt")
    }

    pub fn isolate_path(&self) -> &Path {
        &self.isolate_path
    }

    pub fn cgroup(&self) -> bool {
        self.cgroup
    }

    /// Write a file into the box, marking it executable when requested
    #[instrument(skip(self, content))]
    pub async fn write_file(
        &self,
        name: &str,
        content: &[u8],
        executable: bool,
    ) -> Result<(), IsolateError> {
        let path = self.file_path(name)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, content).await?;
        let mode = if executable { EXECUTABLE_MODE } else { DATA_MODE };
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).await?;

        debug!(?path, len = content.len(), executable, "wrote file to box");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>, IsolateError> {
        let path = self.file_path(name)?;
        let content = tokio::fs::read(&path).await?;
        debug!(?path, len = content.len(), "read file from box");
        Ok(content)
    }

    pub async fn file_exists(&self, name: &str) -> Result<bool, IsolateError> {
        let path = self.file_path(name)?;
        Ok(tokio::fs::metadata(&path).await.is_ok())
    }

    /// Clean up the box
    ///
    /// Idempotent: a box that was already cleaned up returns `Ok(())`.
    #[must_use = "cleanup errors should be handled"]
    #[instrument(skip(self), fields(box_id = self.id))]
    pub async fn cleanup(&mut self) -> Result<(), IsolateError> {
        if !self.initialized {
            return Ok(());
        }

        let args = IsolateCommand::new(&self.isolate_path, self.id)
            .action(IsolateAction::Cleanup)
            .cgroup(self.cgroup)
            .build();

        debug!(?args, "cleaning up isolate box");

        let output = Command::new(&args[0])
            .args(&args[1..])
            .output()
            .await
            .map_err(IsolateError::SpawnFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(stderr = %stderr, "cleanup failed");
            return Err(IsolateError::CleanupFailed {
                id: self.id,
                message: stderr.to_string(),
            });
        }

        self.initialized = false;
        self.lease = None;
        debug!("box cleaned up");
        Ok(())
    }

    /// A box handle that was never initialized, for exercising path and command logic
    #[cfg(test)]
    pub(crate) fn detached(id: u32, box_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            box_path: box_path.into(),
            isolate_path: PathBuf::from("isolate"),
            initialized: false,
            cgroup: false,
            lease: None,
        }
    }

    fn with_lease(mut self, lease: BoxLease) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Check if the box is still initialized (not yet cleaned up)
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Drop for IsolateBox {
    fn drop(&mut self) {
        if !self.initialized {
            return;
        }

        warn!(
            box_id = self.id,
            box_path = %self.box_path.display(),
            "IsolateBox dropped without explicit cleanup, attempting best-effort cleanup"
        );

        let args = IsolateCommand::new(&self.isolate_path, self.id)
            .action(IsolateAction::Cleanup)
            .cgroup(self.cgroup)
            .build();
        let id = self.id;
        // The box id stays taken until the cleanup attempt has finished
        let lease = self.lease.take();

        std::thread::spawn(move || {
            let _lease = lease;
            match std::process::Command::new(&args[0]).args(&args[1..]).output() {
                Ok(output) if output.status.success() => {
                    debug!(box_id = id, "best-effort cleanup succeeded");
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(box_id = id, stderr = %stderr, "best-effort cleanup failed");
                }
                Err(e) => {
                    warn!(box_id = id, error = %e, "best-effort cleanup spawn failed");
                }
            }
        });
    }
}

/// Reject names that would escape the box directory
fn check_name(name: &str) -> Result<(), IsolateError> {
    if name.is_empty() || name.contains("..") || name.starts_with('/') {
        return Err(IsolateError::InvalidPath(format!(
            "path traversal not allowed: {name:?}"
        )));
    }
    Ok(())
}

/// Exclusive claim on one box id of a [`BoxPool`]
///
/// Dropping the lease puts the id back on the free list before the
/// semaphore permit is released.
#[derive(Debug)]
pub struct BoxLease {
    id: u32,
    free: Arc<Mutex<VecDeque<u32>>>,
    _permit: OwnedSemaphorePermit,
}

impl BoxLease {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for BoxLease {
    fn drop(&mut self) {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(self.id);
    }
}

/// Pool of isolate boxes bounding how many jobs run at once
///
/// Ids are handed out from a free list, so a box in use is never given to a
/// second job.
#[derive(Debug)]
pub struct BoxPool {
    count: u32,

    isolate_path: PathBuf,

    cgroup: bool,

    semaphore: Arc<Semaphore>,

    free: Arc<Mutex<VecDeque<u32>>>,
}

impl BoxPool {
    pub fn new(start_id: u32, count: u32, isolate_path: impl Into<PathBuf>, cgroup: bool) -> Self {
        let count = count.max(1);
        Self {
            count,
            isolate_path: isolate_path.into(),
            cgroup,
            semaphore: Arc::new(Semaphore::new(count as usize)),
            free: Arc::new(Mutex::new((start_id..start_id.saturating_add(count)).collect())),
        }
    }

    /// Claim a free box id, waiting until one is returned
    pub async fn lease(&self) -> Result<BoxLease, IsolateError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IsolateError::PoolExhausted)?;

        let id = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or(IsolateError::PoolExhausted)?;

        Ok(BoxLease {
            id,
            free: Arc::clone(&self.free),
            _permit: permit,
        })
    }

    /// Acquire a box from the pool, waiting until one is free
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<IsolateBox, IsolateError> {
        let lease = self.lease().await?;
        let id = lease.id();

        debug!(id, "acquired box from pool");

        let sandbox = IsolateBox::init(id, &self.isolate_path, self.cgroup).await?;

        Ok(sandbox.with_lease(lease))
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> u32 {
        self.count
    }
}
