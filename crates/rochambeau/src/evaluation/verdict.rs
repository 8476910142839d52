use std::fmt;

use thiserror::Error;

use crate::evaluation::outcome::{MalformedCheckerOutput, Outcome};
use crate::runner::StagingError;
use crate::sandbox::SandboxError;
use crate::types::{ExecutionResult, Text};

/// Pipeline stage, used to label faults and log spans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquire,
    Staging,
    ContestantRun,
    Checker,
    Release,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Acquire => "acquire",
            Stage::Staging => "staging",
            Stage::ContestantRun => "contestant run",
            Stage::Checker => "checker",
            Stage::Release => "release",
        })
    }
}

/// Faults of the evaluation infrastructure, never of the contestant
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("sandbox error during {stage}: {source}")]
    Sandbox {
        stage: Stage,
        #[source]
        source: SandboxError,
    },

    #[error("task has no manager named 'checker'")]
    MissingChecker,

    #[error("language '{0}' is not configured")]
    UnknownLanguage(String),

    #[error("job has no executable to run")]
    NoExecutable,

    #[error("checker failed: {}", describe_failure(.0))]
    CheckerFailed(ExecutionResult),

    #[error("malformed checker output: {0}")]
    MalformedCheckerOutput(#[from] MalformedCheckerOutput),
}

impl EvaluationError {
    pub(crate) fn sandbox(stage: Stage) -> impl FnOnce(SandboxError) -> Self {
        move |source| Self::Sandbox { stage, source }
    }

    /// Faults caused by how the task or the judge is set up rather than by
    /// the machine running it
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingChecker | Self::UnknownLanguage(_))
    }
}

fn describe_failure(result: &ExecutionResult) -> String {
    match (result.exit_code, result.signal) {
        (_, Some(signal)) => format!("status {:?}, signal {signal}", result.status),
        (Some(code), None) => format!("status {:?}, exit code {code}", result.status),
        (None, None) => format!("status {:?}", result.status),
    }
}

/// Classification of a finished evaluation
///
/// The job's `success`, `outcome` and `text` fields are derived from this, so
/// a failed job can never carry an outcome.
#[derive(Debug)]
pub enum Verdict {
    /// The pipeline ran to a score: the checker's, or 0.0 for an execution-only job
    Scored(Outcome),
    /// The contestant's program misbehaved; scored 0.0 with an explanation
    ContestantFault(Text),
    /// The infrastructure failed; no outcome
    Fault(EvaluationError),
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        !matches!(self, Verdict::Fault(_))
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Verdict::Scored(outcome) => Some(outcome.clone()),
            Verdict::ContestantFault(text) => Some(Outcome::zero(text.clone())),
            Verdict::Fault(_) => None,
        }
    }

    pub fn text(&self) -> Option<Text> {
        self.outcome().map(|outcome| outcome.text)
    }
}

impl From<EvaluationError> for Verdict {
    fn from(error: EvaluationError) -> Self {
        Verdict::Fault(error)
    }
}
