//! The evaluation pipeline
//!
//! A job runs in one sandbox through two stages. The contestant's program is
//! started by the game judge, which writes the game transcript to
//! `output.txt`. Then the task's checker compares that transcript with the
//! reference output and prints a score. Either stage can end the job early.
//! Contestant misbehavior scores zero. Infrastructure faults leave the job
//! without an outcome.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

pub use crate::evaluation::job::EvaluationJob;
pub use crate::evaluation::limits::{
    BASE_PROCESSES, LIMIT_RULES, LimitRule, MemoryAdjustment, ResourceLimitProfile, RuntimeClass,
};
pub use crate::evaluation::messages::human_evaluation_message;
pub use crate::evaluation::outcome::{MalformedCheckerOutput, Outcome, Score, extract_outcome};
pub use crate::evaluation::verdict::{EvaluationError, Stage, Verdict};

mod job;
mod limits;
pub mod messages;
mod outcome;
mod verdict;

use crate::config::{Config, Language};
use crate::evaluation::messages::{EXECUTION_COMPLETED, MISSING_OUTPUT};
use crate::runner::{StagedFile, persist_file, run_step, stage_files};
use crate::sandbox::{Sandbox, SandboxProvider, Step};
use crate::storage::{Digest, Storage};
use crate::types::{ExecutionResult, ResourceLimits, Text};

/// Testcase input, as the judge expects to find it
pub const JUDGE_INPUT: &str = "judge_program";
/// Transcript written by the judge
pub const OUTPUT_FILE: &str = "output.txt";
pub const REFERENCE_OUTPUT: &str = "res.txt";
/// Manager name of the checker, also its file name in the sandbox
pub const CHECKER: &str = "checker";
pub const CHECKER_STDOUT: &str = "checker_stdout.txt";
pub const CHECKER_STDERR: &str = "checker_stderr.txt";

/// What a job produced besides its verdict
#[derive(Debug, Default)]
struct Artifacts {
    plus: Option<ExecutionResult>,
    user_output: Option<Digest>,
}

/// Runs evaluation jobs against a sandbox provider and a file store
#[derive(Debug)]
pub struct Evaluator<P, S> {
    provider: P,
    storage: S,
    config: Arc<Config>,
}

impl<P, S> Evaluator<P, S>
where
    P: SandboxProvider,
    S: Storage,
{
    pub fn new(provider: P, storage: S, config: Arc<Config>) -> Self {
        Self {
            provider,
            storage,
            config,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Evaluate a job and write the result into it
    ///
    /// Never fails: every fault becomes part of the returned verdict and of
    /// the job's result fields. The sandbox is released exactly once, after
    /// the last stage and before the result is recorded.
    #[instrument(skip_all, fields(job = %job.info, language = %job.language))]
    pub async fn evaluate(&self, job: &mut EvaluationJob) -> Verdict {
        let mut artifacts = Artifacts::default();

        let verdict = match self.provider.acquire().await {
            Ok(mut sandbox) => {
                let verdict = self
                    .run_stages(&sandbox, job, &mut artifacts)
                    .await
                    .unwrap_or_else(Verdict::Fault);

                if let Err(error) = sandbox.release().await {
                    error!(stage = %Stage::Release, %error, "failed to release sandbox");
                }
                verdict
            }
            Err(source) => Verdict::Fault(EvaluationError::Sandbox {
                stage: Stage::Acquire,
                source,
            }),
        };

        log_verdict(&verdict);
        job.record(&verdict, artifacts.plus, artifacts.user_output);
        verdict
    }

    async fn run_stages(
        &self,
        sandbox: &P::Sandbox,
        job: &EvaluationJob,
        artifacts: &mut Artifacts,
    ) -> Result<Verdict, EvaluationError> {
        let language = self
            .config
            .get_language(&job.language)
            .map_err(|_| EvaluationError::UnknownLanguage(job.language.clone()))?;
        let (binary, executable) = job
            .executables
            .iter()
            .next()
            .ok_or(EvaluationError::NoExecutable)?;

        stage_files(
            sandbox,
            &self.storage,
            &[
                StagedFile::executable(binary, executable.clone()),
                StagedFile::data(JUDGE_INPUT, job.input.clone()),
            ],
        )
        .await?;

        let step = self.contestant_step(language, binary, job);
        debug!(stage = %Stage::ContestantRun, command = ?step.command, "starting judge");
        let result = run_step(sandbox, &step)
            .await
            .map_err(EvaluationError::sandbox(Stage::ContestantRun))?;
        artifacts.plus = Some(result.clone());

        if !result.is_success() {
            return Ok(Verdict::ContestantFault(human_evaluation_message(&result)));
        }

        let produced_output = sandbox
            .file_exists(OUTPUT_FILE)
            .await
            .map_err(EvaluationError::sandbox(Stage::ContestantRun))?;
        if !produced_output {
            return Ok(Verdict::ContestantFault(Text::new(MISSING_OUTPUT)));
        }

        if job.get_output {
            let description = format!("Output file in job {}", job.info);
            match persist_file(
                sandbox,
                &self.storage,
                OUTPUT_FILE,
                &description,
                self.config.evaluation.user_output_limit,
            )
            .await
            {
                Ok(digest) => artifacts.user_output = Some(digest),
                Err(error) => warn!(%error, "failed to store contestant output"),
            }
        }

        if job.only_execution {
            return Ok(Verdict::Scored(Outcome::zero(Text::new(EXECUTION_COMPLETED))));
        }

        self.check(sandbox, job).await.map(Verdict::Scored)
    }

    async fn check(&self, sandbox: &P::Sandbox, job: &EvaluationJob) -> Result<Outcome, EvaluationError> {
        stage_files(
            sandbox,
            &self.storage,
            &[StagedFile::data(REFERENCE_OUTPUT, job.output.clone())],
        )
        .await?;

        let checker = job
            .managers
            .get(CHECKER)
            .ok_or(EvaluationError::MissingChecker)?;
        stage_files(
            sandbox,
            &self.storage,
            &[StagedFile::executable(CHECKER, checker.clone())],
        )
        .await?;

        let step = Step::new([
            format!("./{CHECKER}"),
            JUDGE_INPUT.to_string(),
            REFERENCE_OUTPUT.to_string(),
            OUTPUT_FILE.to_string(),
        ])
        .stdout(CHECKER_STDOUT)
        .stderr(CHECKER_STDERR);

        debug!(stage = %Stage::Checker, "starting checker");
        let result = run_step(sandbox, &step)
            .await
            .map_err(EvaluationError::sandbox(Stage::Checker))?;
        if !result.is_success() {
            return Err(EvaluationError::CheckerFailed(result));
        }

        let stdout = sandbox
            .read_file(CHECKER_STDOUT)
            .await
            .map_err(EvaluationError::sandbox(Stage::Checker))?;
        let has_stderr = sandbox
            .file_exists(CHECKER_STDERR)
            .await
            .map_err(EvaluationError::sandbox(Stage::Checker))?;
        let stderr = if has_stderr {
            sandbox
                .read_file(CHECKER_STDERR)
                .await
                .map_err(EvaluationError::sandbox(Stage::Checker))?
        } else {
            Vec::new()
        };

        Ok(extract_outcome(&stdout, &stderr)?)
    }

    /// The judge runs the contestant's command, passed as a single argument
    fn contestant_step(&self, language: &Language, binary: &str, job: &EvaluationJob) -> Step {
        let profile = ResourceLimitProfile::resolve(language.runtime, job.memory_limit);
        let declared_mb = job.memory_limit.unwrap_or_else(|| {
            self.config.default_limits.memory_limit.unwrap_or(0) / ResourceLimits::MB
        });
        let contestant = language.evaluation_command(binary, declared_mb).join(" ");

        Step::new([
            self.config.evaluation.judge_path.to_string_lossy().into_owned(),
            contestant,
            JUDGE_INPUT.to_string(),
        ])
        .limits(profile.to_limits(job.time_limit))
        .stdout(OUTPUT_FILE)
        .envs(language.step_env())
        .mounts(language.run.mounts.iter().cloned())
    }
}

fn log_verdict(verdict: &Verdict) {
    match verdict {
        Verdict::Scored(outcome) => {
            info!(score = %outcome.score, text = %outcome.text, "evaluation finished");
        }
        Verdict::ContestantFault(text) => {
            info!(score = %Score::ZERO, %text, "contestant run failed");
        }
        Verdict::Fault(error) if error.is_configuration() => {
            error!(%error, "configuration error");
        }
        Verdict::Fault(error) => {
            error!(%error, "evaluation failed");
        }
    }
}
