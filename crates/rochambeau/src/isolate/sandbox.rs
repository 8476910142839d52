//! Isolate-backed implementation of the [`Sandbox`] capability

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::Config;
use crate::config::language::DEFAULT_SANDBOX_PATH;
use crate::isolate::box_manager::{BoxPool, IsolateBox};
use crate::isolate::command::{IsolateAction, IsolateCommand};
use crate::isolate::process::{Redirects, run_batch};
use crate::isolate::validate_mounts;
use crate::sandbox::{Sandbox, SandboxError, SandboxProvider, Step};
use crate::types::ExecutionResult;

/// Hands out boxes from a [`BoxPool`] sized by the configuration
#[derive(Debug)]
pub struct IsolateProvider {
    pool: BoxPool,
    config: Arc<Config>,
}

impl IsolateProvider {
    pub fn new(config: Arc<Config>) -> Self {
        let pool = BoxPool::new(
            config.pool.first_box_id,
            config.pool.boxes,
            config.isolate_binary(),
            config.cgroup,
        );
        Self { pool, config }
    }

    pub fn pool(&self) -> &BoxPool {
        &self.pool
    }
}

impl SandboxProvider for IsolateProvider {
    type Sandbox = IsolateSandbox;

    async fn acquire(&self) -> Result<IsolateSandbox, SandboxError> {
        let inner = self.pool.acquire().await?;
        Ok(IsolateSandbox {
            inner,
            config: Arc::clone(&self.config),
        })
    }
}

/// An isolate box together with the configuration its steps run under
#[derive(Debug)]
pub struct IsolateSandbox {
    inner: IsolateBox,
    config: Arc<Config>,
}

impl IsolateSandbox {
    pub fn new(inner: IsolateBox, config: Arc<Config>) -> Self {
        Self { inner, config }
    }

    pub fn isolate_box(&self) -> &IsolateBox {
        &self.inner
    }

    /// Build the isolate invocation for a step, layering its limits over the configured defaults
    fn command_for(&self, step: &Step) -> IsolateCommand {
        let limits = self.config.default_limits.with_overrides(&step.limits);

        IsolateCommand::new(self.inner.isolate_path(), self.inner.id())
            .action(IsolateAction::Run)
            .cgroup(self.inner.cgroup())
            .limits(limits)
            .working_dir("/box")
            .env("PATH", DEFAULT_SANDBOX_PATH)
            .mounts(self.config.sandbox_mounts.iter().cloned())
            .mounts(step.mounts.iter().cloned())
            .envs(step.env.iter().cloned())
            .command(step.command.iter().cloned())
    }
}

impl Sandbox for IsolateSandbox {
    async fn write_file(
        &self,
        name: &str,
        content: &[u8],
        executable: bool,
    ) -> Result<(), SandboxError> {
        Ok(self.inner.write_file(name, content, executable).await?)
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, SandboxError> {
        Ok(self.inner.read_file(name).await?)
    }

    async fn file_exists(&self, name: &str) -> Result<bool, SandboxError> {
        Ok(self.inner.file_exists(name).await?)
    }

    #[instrument(skip(self, step), fields(box_id = self.inner.id()))]
    async fn execute(&self, step: &Step) -> Result<ExecutionResult, SandboxError> {
        validate_mounts(&step.mounts)?;

        let memory_limit = self
            .config
            .default_limits
            .with_overrides(&step.limits)
            .memory_limit;

        let redirects = Redirects {
            stdin: step.stdin.as_deref(),
            stdout: step.stdout.as_deref(),
            stderr: step.stderr.as_deref(),
        };

        let mut result = run_batch(&self.inner, self.command_for(step), &redirects).await?;

        if let Some(limit) = memory_limit {
            result.detect_memory_limit(limit);
        }

        debug!(status = ?result.status, limit_exceeded = ?result.limit_exceeded, "step finished");
        Ok(result)
    }

    async fn release(&mut self) -> Result<(), SandboxError> {
        Ok(self.inner.cleanup().await?)
    }
}
