//! Sandboxed evaluation of rock-paper-scissors game submissions.
//!
//! Rochambeau runs a contestant's program through a game judge inside an
//! IOI Isolate sandbox, checks the produced transcript with a task-provided
//! checker, and reports a score in `[0, 1]` together with a human-readable
//! message.
//!
//! # Features
//!
//! - **Evaluation pipeline** — [`Evaluator`] sequences the contestant run and
//!   the checker run and classifies every failure as a contestant fault or an
//!   infrastructure fault.
//! - **Per-runtime limits** — a table of [`RuntimeClass`] rules adjusts process
//!   and memory limits for managed runtimes.
//! - **Pluggable sandbox and storage** — the pipeline only sees the
//!   [`Sandbox`] and [`Storage`] traits; Isolate and a local content-addressed
//!   store are provided.
//! - **TOML configuration** — languages, limits and judge paths.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language};
pub use evaluation::{
    EvaluationError, EvaluationJob, Evaluator, MalformedCheckerOutput, Outcome,
    ResourceLimitProfile, RuntimeClass, Score, Verdict,
};
pub use isolate::{BoxPool, IsolateBox, IsolateError, IsolateProvider, IsolateSandbox, prepare_cgroup};
pub use sandbox::{Sandbox, SandboxError, SandboxProvider, Step};
pub use storage::{Digest, LocalStorage, Storage, StorageError};
pub use types::{ExecutionResult, ExecutionStatus, LimitExceeded, MountConfig, ResourceLimits, Text};

pub mod config;
pub mod evaluation;
pub mod isolate;
pub mod runner;
pub mod sandbox;
pub mod storage;
pub mod types;
