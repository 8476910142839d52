//! Sandbox-level building blocks of an evaluation
//!
//! Staging files into a sandbox, running one step in it and persisting a
//! sandbox file back to storage.

use tracing::{debug, instrument, warn};

pub use crate::runner::staging::{StagedFile, StagingError, persist_file, stage_files};

mod staging;

use crate::sandbox::{Sandbox, SandboxError, Step};
use crate::types::ExecutionResult;

/// Run a single step and separate environment faults from program behavior
///
/// Timeouts, signals and nonzero exits come back as `Ok` with the matching
/// status. An isolate internal error is an environment fault and is returned
/// as [`SandboxError::Internal`].
#[instrument(skip(sandbox, step), fields(program = step.command.first().map(String::as_str)))]
pub async fn run_step<S: Sandbox>(sandbox: &S, step: &Step) -> Result<ExecutionResult, SandboxError> {
    let result = sandbox.execute(step).await?;

    if result.is_sandbox_failure() {
        let message = result
            .message
            .clone()
            .unwrap_or_else(|| "isolate reported an internal error".to_string());
        warn!(%message, "sandbox failure");
        return Err(SandboxError::Internal(message));
    }

    debug!(
        status = ?result.status,
        time = result.time,
        wall_time = result.wall_time,
        memory = result.memory,
        exit_code = ?result.exit_code,
        "step complete"
    );

    Ok(result)
}
