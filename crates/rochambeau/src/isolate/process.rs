//! Process spawning for Isolate
//!
//! Runs a command inside a box with file-based I/O and turns the meta file
//! into an [`ExecutionResult`].

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, instrument};

use crate::isolate::IsolateError;
use crate::isolate::box_manager::IsolateBox;
use crate::isolate::command::IsolateCommand;
use crate::isolate::meta::MetaFile;
use crate::types::ExecutionResult;

/// File redirections for a batch run, as names relative to the box directory
#[derive(Debug, Clone, Default)]
pub struct Redirects<'a> {
    pub stdin: Option<&'a str>,
    pub stdout: Option<&'a str>,
    pub stderr: Option<&'a str>,
}

/// Run an isolate command and parse the meta file result
async fn run_isolate_command(args: Vec<String>, meta_path: &Path) -> Result<MetaFile, IsolateError> {
    // A stale meta file from a previous step must not be mistaken for this one
    if tokio::fs::metadata(meta_path).await.is_ok() {
        tokio::fs::remove_file(meta_path).await?;
    }

    let output = Command::new(&args[0])
        .args(&args[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(IsolateError::SpawnFailed)?;

    if tokio::fs::metadata(meta_path).await.is_err() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(IsolateError::CommandFailed(stderr.trim().to_string()));
    }

    MetaFile::load(meta_path).await
}

/// Run a command in an Isolate box with batch I/O
///
/// Redirect targets are opened by isolate inside the sandbox. A program that
/// exits non-zero, times out or is signaled still yields `Ok`; only failures
/// to run isolate itself are errors.
#[instrument(skip(sandbox, command), fields(box_id = sandbox.id()))]
pub async fn run_batch(
    sandbox: &IsolateBox,
    command: IsolateCommand,
    redirects: &Redirects<'_>,
) -> Result<ExecutionResult, IsolateError> {
    let meta_path = sandbox.meta_path();

    let mut command = command.meta_file(&meta_path);
    if let Some(stdin) = redirects.stdin {
        command = command.stdin(sandbox.sandbox_path(stdin)?);
    }
    if let Some(stdout) = redirects.stdout {
        command = command.stdout(sandbox.sandbox_path(stdout)?);
    }
    if let Some(stderr) = redirects.stderr {
        command = command.stderr(sandbox.sandbox_path(stderr)?);
    }

    let args = command.build();
    debug!(?args, "running isolate command");

    let meta = run_isolate_command(args, &meta_path).await?;
    let result = meta.to_execution_result();

    debug!(
        status = ?result.status,
        time = result.time,
        memory = result.memory,
        exit_code = ?result.exit_code,
        "execution complete"
    );

    Ok(result)
}
