//! Isolate meta files as the pipeline sees them

use rochambeau::evaluation::human_evaluation_message;
use rochambeau::evaluation::messages::{MEMORY_LIMIT, NONZERO_RETURN, TIMEOUT, WALL_TIMEOUT};
use rochambeau::isolate::MetaFile;
use rochambeau::{ExecutionResult, ExecutionStatus, LimitExceeded};

use super::FIXTURES_PATH;

fn load(name: &str) -> ExecutionResult {
    let path = format!("{FIXTURES_PATH}/meta/{name}");
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read meta fixture {path}: {e}"));
    MetaFile::try_parse(&content)
        .unwrap_or_else(|e| panic!("Invalid meta fixture {path}: {e}"))
        .to_execution_result()
}

#[test]
fn clean_exit() {
    let result = load("success.meta");
    assert!(result.is_success());
    assert_eq!(result.memory, 3456);
}

#[test]
fn cpu_timeout() {
    let result = load("tle.meta");
    assert_eq!(result.status, ExecutionStatus::TimeLimitExceeded);
    assert_eq!(result.limit_exceeded, LimitExceeded::Time);
    assert_eq!(human_evaluation_message(&result).to_string(), TIMEOUT);
}

#[test]
fn wall_clock_timeout() {
    let result = load("wall_tle.meta");
    assert_eq!(result.limit_exceeded, LimitExceeded::WallTime);
    assert_eq!(human_evaluation_message(&result).to_string(), WALL_TIMEOUT);
}

#[test]
fn oom_kill() {
    let result = load("mle.meta");
    assert_eq!(result.status, ExecutionStatus::Signaled);
    assert_eq!(result.limit_exceeded, LimitExceeded::Memory);
    assert_eq!(human_evaluation_message(&result).to_string(), MEMORY_LIMIT);
}

#[test]
fn segfault_mentions_signal() {
    let result = load("signal.meta");
    assert_eq!(result.signal, Some(11));
    assert_eq!(
        human_evaluation_message(&result).to_string(),
        "Execution killed with signal 11 (could be triggered by violating memory limits)"
    );
}

#[test]
fn segfault_at_memory_limit_counts_as_memory() {
    let mut result = load("signal.meta");
    result.detect_memory_limit(1024);
    assert_eq!(result.limit_exceeded, LimitExceeded::Memory);
}

#[test]
fn runtime_error() {
    let result = load("runtime_error.meta");
    assert_eq!(result.exit_code, Some(3));
    assert_eq!(human_evaluation_message(&result).to_string(), NONZERO_RETURN);
}

#[test]
fn internal_error_is_a_sandbox_failure() {
    let result = load("internal_error.meta");
    assert!(result.is_sandbox_failure());
    assert!(!result.is_success());
}
