use rochambeau::isolate::{BoxPool, IsolateBox};

use super::test_config;

#[tokio::test]
#[ignore = "requires root"]
async fn test_box_init_and_cleanup() {
    let config = test_config();
    let mut sandbox = IsolateBox::init(0, config.isolate_binary(), config.cgroup)
        .await
        .expect("Failed to create sandbox");

    assert!(sandbox.path().exists());
    assert!(sandbox.is_initialized());

    sandbox.cleanup().await.expect("Failed to cleanup sandbox");
    assert!(!sandbox.is_initialized());

    // A second cleanup is a no-op
    sandbox.cleanup().await.expect("Second cleanup failed");
}

#[tokio::test]
#[ignore = "requires root"]
async fn test_box_files() {
    let config = test_config();
    let mut sandbox = IsolateBox::init(1, config.isolate_binary(), config.cgroup)
        .await
        .expect("Failed to create sandbox");

    assert!(!sandbox.file_exists("judge_program").await.unwrap());

    sandbox
        .write_file("judge_program", b"rounds 3\n", false)
        .await
        .expect("Failed to write file");
    assert!(sandbox.file_exists("judge_program").await.unwrap());
    assert_eq!(
        sandbox.read_file("judge_program").await.unwrap(),
        b"rounds 3\n"
    );

    sandbox.cleanup().await.expect("Failed to cleanup");
}

#[tokio::test]
#[ignore = "requires root"]
async fn test_box_pool() {
    let config = test_config();
    let pool = BoxPool::new(10, 2, config.isolate_binary(), config.cgroup);

    let mut first = pool.acquire().await.expect("Failed to acquire box");
    let mut second = pool.acquire().await.expect("Failed to acquire second box");

    assert_ne!(first.id(), second.id());
    assert_eq!(pool.available(), 0);

    first.cleanup().await.expect("Failed to cleanup first box");
    second.cleanup().await.expect("Failed to cleanup second box");
    drop(first);
    drop(second);

    assert_eq!(pool.available(), 2);
}
