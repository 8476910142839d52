//! Sandbox capability used by the evaluation pipeline
//!
//! The pipeline never talks to Isolate directly. It acquires a [`Sandbox`]
//! from a [`SandboxProvider`], stages files into it, executes [`Step`]s and
//! releases it when the job is done.

use std::future::Future;

use thiserror::Error;

use crate::isolate::IsolateError;
use crate::types::{ExecutionResult, MountConfig, ResourceLimits};

/// Errors raised by the sandbox environment itself
///
/// These never describe contestant behavior: a program that crashes or runs
/// out of time is reported through [`ExecutionResult`], not through this type.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("isolate error: {0}")]
    Isolate(#[from] IsolateError),

    #[error("sandbox internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single command to run inside a sandbox
#[derive(Debug, Clone)]
pub struct Step {
    /// Program and arguments
    pub command: Vec<String>,

    /// Limits for this step, layered over the sandbox defaults
    pub limits: ResourceLimits,

    /// File names inside the sandbox for I/O redirection
    pub stdin: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,

    /// Extra environment variables
    pub env: Vec<(String, String)>,

    /// Extra directory mounts
    pub mounts: Vec<MountConfig>,
}

impl Step {
    /// Create a step that runs `command` with the sandbox's default limits
    pub fn new(command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            limits: ResourceLimits::none(),
            stdin: None,
            stdout: None,
            stderr: None,
            env: Vec::new(),
            mounts: Vec::new(),
        }
    }

    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn stdin(mut self, name: impl Into<String>) -> Self {
        self.stdin = Some(name.into());
        self
    }

    pub fn stdout(mut self, name: impl Into<String>) -> Self {
        self.stdout = Some(name.into());
        self
    }

    pub fn stderr(mut self, name: impl Into<String>) -> Self {
        self.stderr = Some(name.into());
        self
    }

    pub fn envs<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn mounts(mut self, mounts: impl IntoIterator<Item = MountConfig>) -> Self {
        self.mounts.extend(mounts);
        self
    }
}

/// An exclusively owned, confined execution environment
pub trait Sandbox: Send + Sync {
    /// Write `content` to `name` inside the sandbox
    fn write_file(
        &self,
        name: &str,
        content: &[u8],
        executable: bool,
    ) -> impl Future<Output = Result<(), SandboxError>> + Send;

    fn read_file(&self, name: &str) -> impl Future<Output = Result<Vec<u8>, SandboxError>> + Send;

    fn file_exists(&self, name: &str) -> impl Future<Output = Result<bool, SandboxError>> + Send;

    /// Run a step to completion
    ///
    /// Contestant-caused failures are encoded in the returned result.
    fn execute(
        &self,
        step: &Step,
    ) -> impl Future<Output = Result<ExecutionResult, SandboxError>> + Send;

    /// Tear the sandbox down. Must be called exactly once.
    fn release(&mut self) -> impl Future<Output = Result<(), SandboxError>> + Send;
}

/// Source of fresh sandboxes, one per job
pub trait SandboxProvider: Send + Sync {
    type Sandbox: Sandbox;

    fn acquire(&self) -> impl Future<Output = Result<Self::Sandbox, SandboxError>> + Send;
}
