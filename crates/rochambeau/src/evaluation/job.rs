use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::evaluation::verdict::Verdict;
use crate::storage::Digest;
use crate::types::{ExecutionResult, Text};

/// One submission evaluated on one testcase
///
/// The input fields describe what to run; the result fields are filled in by
/// [`Evaluator::evaluate`](crate::Evaluator::evaluate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationJob {
    /// Free-form label used in logs
    #[serde(default)]
    pub info: String,

    /// Language ID from the configuration
    pub language: String,

    /// Executables by file name; the first one is the contestant's program
    pub executables: BTreeMap<String, Digest>,

    /// Testcase input, handed to the judge as `judge_program`
    pub input: Digest,

    /// Reference output the checker compares against
    pub output: Digest,

    /// Task-provided helper files, the checker among them
    #[serde(default)]
    pub managers: BTreeMap<String, Digest>,

    /// CPU time limit in seconds
    #[serde(default)]
    pub time_limit: Option<f64>,

    /// Memory limit in MB
    #[serde(default)]
    pub memory_limit: Option<u64>,

    /// Store the contestant's output and report its digest in `user_output`
    #[serde(default)]
    pub get_output: bool,

    /// Stop after the contestant run without checking the output
    #[serde(default)]
    pub only_execution: bool,

    #[serde(default)]
    pub success: bool,

    /// Score as a decimal string, present only when `success` is true
    #[serde(default)]
    pub outcome: Option<String>,

    #[serde(default)]
    pub text: Option<Text>,

    #[serde(default)]
    pub user_output: Option<Digest>,

    /// Metrics of the contestant run
    #[serde(default)]
    pub plus: Option<ExecutionResult>,
}

impl EvaluationJob {
    pub fn new(language: impl Into<String>, input: Digest, output: Digest) -> Self {
        Self {
            info: String::new(),
            language: language.into(),
            executables: BTreeMap::new(),
            input,
            output,
            managers: BTreeMap::new(),
            time_limit: None,
            memory_limit: None,
            get_output: false,
            only_execution: false,
            success: false,
            outcome: None,
            text: None,
            user_output: None,
            plus: None,
        }
    }

    /// Write the verdict back into the result fields
    ///
    /// When the job asked for its output, `user_output` is replaced even if
    /// nothing was stored, so a stale digest never survives a failed run.
    pub fn record(
        &mut self,
        verdict: &Verdict,
        plus: Option<ExecutionResult>,
        user_output: Option<Digest>,
    ) {
        let outcome = verdict.outcome();
        self.success = verdict.is_success();
        self.outcome = outcome.as_ref().map(|o| o.score.to_string());
        self.text = outcome.map(|o| o.text);
        self.plus = plus;
        if self.get_output {
            self.user_output = user_output;
        }
    }
}
