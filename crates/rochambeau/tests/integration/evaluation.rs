use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use rochambeau::evaluation::messages::{OUTPUT_CORRECT, TIMEOUT};
use rochambeau::{
    EvaluationJob, Evaluator, IsolateProvider, LocalStorage, MountConfig, Storage, Text,
};

use super::test_config;

const JUDGE: &str = "#!/bin/sh\n$1 < \"$2\"\n";
const ECHO_CONTESTANT: &str = "#!/bin/sh\ncat\n";
const LOOPING_CONTESTANT: &str = "#!/bin/sh\nwhile :; do :; done\n";
const CHECKER: &str = "#!/bin/sh\n\
if cmp -s \"$2\" \"$3\"; then\n  echo 1\n  echo translate:success >&2\n\
else\n  echo 0\n  echo translate:wrong >&2\nfi\n";

fn write_executable(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

async fn setup(contestant: &str, first_box_id: u32) -> (Evaluator<IsolateProvider, LocalStorage>, EvaluationJob, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
    let judge_dir = dir.path().join("judge");
    std::fs::create_dir(&judge_dir).unwrap();
    std::fs::set_permissions(&judge_dir, std::fs::Permissions::from_mode(0o755)).unwrap();
    write_executable(&judge_dir, "rps_judge", JUDGE);

    let mut config = test_config();
    config.pool.first_box_id = first_box_id;
    config.evaluation.judge_path = "/judge/rps_judge".into();
    config.default_limits.max_processes = Some(4);
    config.sandbox_mounts.push(MountConfig {
        source: judge_dir.to_string_lossy().into_owned(),
        target: "/judge".to_string(),
        writable: false,
        optional: false,
    });

    let storage = LocalStorage::new(dir.path().join("files"));
    let exe = storage.store(contestant.as_bytes(), "contestant").await.unwrap();
    let input = storage.store(b"R\nP\nS\n", "input").await.unwrap();
    let reference = storage.store(b"R\nP\nS\n", "reference").await.unwrap();
    let checker = storage.store(CHECKER.as_bytes(), "checker").await.unwrap();

    let mut job = EvaluationJob::new("cpp17", input, reference);
    job.info = "integration".to_string();
    job.executables.insert("main".to_string(), exe);
    job.managers.insert("checker".to_string(), checker);
    job.time_limit = Some(0.5);
    job.memory_limit = Some(64);

    let config = Arc::new(config);
    let evaluator = Evaluator::new(IsolateProvider::new(Arc::clone(&config)), storage, config);
    (evaluator, job, dir)
}

#[tokio::test]
#[ignore = "requires root"]
async fn test_correct_transcript_scores_one() {
    let (evaluator, mut job, _dir) = setup(ECHO_CONTESTANT, 60).await;

    evaluator.evaluate(&mut job).await;

    assert!(job.success, "job: {job:?}");
    assert_eq!(job.outcome.as_deref(), Some("1.0"));
    assert_eq!(job.text, Some(Text::new(OUTPUT_CORRECT)));
    assert_eq!(evaluator.provider().pool().available(), 1);
}

#[tokio::test]
#[ignore = "requires root"]
async fn test_looping_contestant_times_out() {
    let (evaluator, mut job, _dir) = setup(LOOPING_CONTESTANT, 61).await;

    evaluator.evaluate(&mut job).await;

    assert!(job.success, "job: {job:?}");
    assert_eq!(job.outcome.as_deref(), Some("0.0"));
    assert_eq!(job.text, Some(Text::new(TIMEOUT)));
}
