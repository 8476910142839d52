//! Evaluation pipeline tests
//!
//! The pipeline runs against an in-memory sandbox whose steps are scripted,
//! so these tests need neither isolate nor root.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};

use rochambeau::{Config, Digest, EvaluationJob, Evaluator};
use tracing_subscriber::fmt::MakeWriter;

use crate::mock::{MockProvider, MockStorage, Scripted};

mod isolate_results;
mod mock;
mod staging;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

const CONFIG: &str = r#"
[evaluation]
judge_path = "/usr/local/bin/rock_paper_scissors_judge"
user_output_limit = 8

[languages.cpp17]
name = "C++17 / g++"

[languages.cpp17.run]
command = ["./{binary}"]

[languages.java]
name = "Java / JDK"
runtime = "jvm"

[languages.java.run]
command = ["/usr/bin/java", "-Xmx{memory}M", "-jar", "{binary}"]
path = "/usr/lib/jvm/bin:/usr/bin:/bin"
"#;

pub(crate) fn test_config() -> Arc<Config> {
    Arc::new(Config::parse_toml(CONFIG).unwrap())
}

/// Storage holding everything [`job`] refers to
pub(crate) fn storage() -> MockStorage {
    MockStorage::default()
        .with("exe", b"\x7fELF contestant")
        .with("in", b"rounds 3\n")
        .with("res", b"R P S\n")
        .with("chk", b"\x7fELF checker")
}

pub(crate) fn job() -> EvaluationJob {
    let mut job = EvaluationJob::new("cpp17", Digest::from("in"), Digest::from("res"));
    job.info = "submission 12 testcase 003".to_string();
    job.executables = BTreeMap::from([("main".to_string(), Digest::from("exe"))]);
    job.managers = BTreeMap::from([("checker".to_string(), Digest::from("chk"))]);
    job.time_limit = Some(1.0);
    job.memory_limit = Some(256);
    job
}

pub(crate) fn evaluator(
    script: impl IntoIterator<Item = Scripted>,
    storage: MockStorage,
) -> Evaluator<MockProvider, MockStorage> {
    Evaluator::new(MockProvider::new(script), storage, test_config())
}

/// Log lines written while `f` runs, without ANSI colors
pub(crate) async fn capture_logs<F, T>(f: F) -> (T, String)
where
    F: Future<Output = T>,
{
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let _guard = tracing::subscriber::set_default(subscriber);
    let value = f.await;
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (value, logs)
}

#[derive(Clone, Default)]
pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
