//! Meta file parsing for isolate
//!
//! Parses the meta file produced by isolate after execution to extract
//! execution results like time used, memory used, and exit status.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::isolate::IsolateError;
use crate::types::{ExecutionResult, ExecutionStatus, LimitExceeded};

/// Error that occurs during meta file parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("meta file parse error at line {line_number}: {message} (line: {line:?})")]
pub struct MetaParseError {
    /// Line number (1-indexed) where the error occurred
    pub line_number: usize,
    /// The problematic line content
    pub line: String,
    pub message: String,
}

/// Parsed meta file from Isolate
#[derive(Debug, Clone, Default)]
pub struct MetaFile {
    /// Raw key-value pairs from the meta file
    pub entries: HashMap<String, String>,
}

impl MetaFile {
    /// Parse meta file content, skipping malformed lines
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim(), value.trim()))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Self { entries }
    }

    /// Parse meta file content, rejecting any non-empty line without a `key:value` shape
    pub fn try_parse(content: &str) -> Result<Self, MetaParseError> {
        let mut entries = HashMap::new();

        for (line_idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let error = |message: &str| MetaParseError {
                line_number: line_idx + 1,
                line: line.to_string(),
                message: message.to_string(),
            };

            // The value is everything after the first colon; messages may contain colons
            let (key, value) = trimmed
                .split_once(':')
                .ok_or_else(|| error("missing colon separator"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(error("empty key before colon"));
            }
            entries.insert(key.to_string(), value.trim().to_string());
        }

        Ok(Self { entries })
    }

    /// Load and strictly parse a meta file from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IsolateError> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::try_parse(&content).map_err(|e| IsolateError::MetaParseFailed(e.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Execution status; isolate omits the key when the program exited cleanly
    pub fn status(&self) -> ExecutionStatus {
        self.get("status")
            .map(ExecutionStatus::from_isolate_status)
            .unwrap_or(ExecutionStatus::Ok)
    }

    /// CPU time used in seconds
    pub fn time(&self) -> f64 {
        self.get_f64("time").unwrap_or(0.0)
    }

    /// Wall clock time used in seconds
    pub fn wall_time(&self) -> f64 {
        self.get_f64("time-wall").unwrap_or(0.0)
    }

    /// Peak memory usage in kilobytes, preferring cgroup accounting over max-rss
    pub fn memory(&self) -> u64 {
        self.get_u64("cg-mem")
            .or_else(|| self.get_u64("max-rss"))
            .unwrap_or(0)
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.get_i32("exitcode")
    }

    pub fn signal(&self) -> Option<i32> {
        self.get_i32("exitsig")
    }

    pub fn message(&self) -> Option<String> {
        self.get("message").map(String::from)
    }

    /// Whether the cgroup OOM killer fired
    pub fn oom_killed(&self) -> bool {
        self.get("cg-oom-killed").is_some()
    }

    /// Determine which limit was exceeded based on status and message
    pub fn limit_exceeded(&self) -> LimitExceeded {
        if self.oom_killed() {
            return LimitExceeded::Memory;
        }

        let from_message = LimitExceeded::from_message(self.get("message"));
        if from_message.is_exceeded() {
            return from_message;
        }

        if self.status() == ExecutionStatus::TimeLimitExceeded {
            return LimitExceeded::Time;
        }

        LimitExceeded::NotExceeded
    }

    /// Convert to an ExecutionResult
    pub fn to_execution_result(&self) -> ExecutionResult {
        ExecutionResult {
            status: self.status(),
            limit_exceeded: self.limit_exceeded(),
            time: self.time(),
            wall_time: self.wall_time(),
            memory: self.memory(),
            exit_code: self.exit_code(),
            signal: self.signal(),
            message: self.message(),
        }
    }
}
