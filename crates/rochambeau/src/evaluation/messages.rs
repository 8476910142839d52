//! Human-readable explanations shown to contestants
//!
//! Templates are stable strings so that a frontend can translate them before
//! substituting the arguments.

use crate::types::{ExecutionResult, ExecutionStatus, LimitExceeded, Text};

pub const TIMEOUT: &str = "Execution timed out";
pub const WALL_TIMEOUT: &str = "Execution timed out (wall clock limit exceeded)";
pub const MEMORY_LIMIT: &str = "Memory limit exceeded";
pub const OUTPUT_LIMIT: &str = "Output limit exceeded";
pub const SIGNALED: &str =
    "Execution killed with signal %s (could be triggered by violating memory limits)";
pub const NONZERO_RETURN: &str = "Execution failed because the return code was nonzero";

pub const MISSING_OUTPUT: &str = "Evaluation did not produce expected output file";
pub const EXECUTION_COMPLETED: &str = "Execution completed successfully";

pub const OUTPUT_CORRECT: &str = "Output is correct";
pub const OUTPUT_PARTIAL: &str = "Output is partially correct";
pub const OUTPUT_WRONG: &str = "Output isn't correct";

/// Explain why a contestant run did not succeed
pub fn human_evaluation_message(result: &ExecutionResult) -> Text {
    match (result.limit_exceeded, result.status) {
        (LimitExceeded::WallTime, _) => Text::new(WALL_TIMEOUT),
        (LimitExceeded::Time, _) | (_, ExecutionStatus::TimeLimitExceeded) => Text::new(TIMEOUT),
        (LimitExceeded::Memory, _) => Text::new(MEMORY_LIMIT),
        (LimitExceeded::Output, _) => Text::new(OUTPUT_LIMIT),
        (_, ExecutionStatus::Signaled) => {
            let signal = result
                .signal
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Text::new(SIGNALED).arg(signal)
        }
        _ => Text::new(NONZERO_RETURN),
    }
}
