use rochambeau::runner::{StagedFile, StagingError, persist_file, run_step, stage_files};
use rochambeau::{Digest, ExecutionResult, ExecutionStatus, SandboxError, Step};

use super::storage;
use crate::mock::{MockSandbox, MockStorage, Scripted, ok_run};

#[tokio::test]
async fn stages_with_executable_bit() {
    let sandbox = MockSandbox::standalone([]);
    let storage = storage();

    stage_files(
        &sandbox,
        &storage,
        &[
            StagedFile::executable("main", Digest::from("exe")),
            StagedFile::data("judge_program", Digest::from("in")),
        ],
    )
    .await
    .unwrap();

    assert_eq!(sandbox.state().file("main").map(|(_, x)| x), Some(true));
    assert_eq!(sandbox.state().file("judge_program").map(|(_, x)| x), Some(false));
}

#[tokio::test]
async fn stops_at_first_missing_digest() {
    let sandbox = MockSandbox::standalone([]);
    let storage = storage();

    let err = stage_files(
        &sandbox,
        &storage,
        &[
            StagedFile::data("res.txt", Digest::from("missing")),
            StagedFile::executable("checker", Digest::from("chk")),
        ],
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StagingError::Fetch { ref name, .. } if name == "res.txt"));
    assert!(sandbox.state().file("checker").is_none());
}

#[tokio::test]
async fn persist_truncates_to_limit() {
    let sandbox = MockSandbox::standalone([]);
    let storage = MockStorage::default();
    rochambeau::Sandbox::write_file(&sandbox, "output.txt", b"0123456789", false)
        .await
        .unwrap();

    let digest = persist_file(&sandbox, &storage, "output.txt", "transcript", 4)
        .await
        .unwrap();

    assert_eq!(digest, Digest::from("stored-1"));
    assert_eq!(storage.stored()[0].0, b"0123");

    let short = persist_file(&sandbox, &storage, "output.txt", "transcript", 1024)
        .await
        .unwrap();
    assert_eq!(short, Digest::from("stored-2"));
    assert_eq!(storage.stored()[1].0, b"0123456789");
}

#[tokio::test]
async fn persist_missing_file_is_a_sandbox_error() {
    let sandbox = MockSandbox::standalone([]);
    let storage = MockStorage::default();

    let err = persist_file(&sandbox, &storage, "output.txt", "transcript", 4)
        .await
        .unwrap_err();
    assert!(matches!(err, StagingError::Sandbox { .. }));
}

#[tokio::test]
async fn run_step_passes_program_failures_through() {
    let crashed = ExecutionResult {
        status: ExecutionStatus::Signaled,
        signal: Some(11),
        ..Default::default()
    };
    let sandbox = MockSandbox::standalone([Scripted::finished(ok_run()), Scripted::finished(crashed)]);
    let step = Step::new(["./main"]);

    assert!(run_step(&sandbox, &step).await.unwrap().is_success());
    let result = run_step(&sandbox, &step).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Signaled);
    assert_eq!(result.signal, Some(11));
}

#[tokio::test]
async fn run_step_turns_internal_errors_into_faults() {
    let sandbox = MockSandbox::standalone([Scripted::finished(ExecutionResult {
        status: ExecutionStatus::InternalError,
        message: Some("cannot create cgroup".into()),
        ..Default::default()
    })]);

    let err = run_step(&sandbox, &Step::new(["./main"])).await.unwrap_err();
    assert!(matches!(err, SandboxError::Internal(ref m) if m == "cannot create cgroup"));
}
