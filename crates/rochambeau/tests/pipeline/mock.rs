//! In-memory sandbox and storage

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rochambeau::{
    Digest, ExecutionResult, ExecutionStatus, LimitExceeded, Sandbox, SandboxError,
    SandboxProvider, Step, Storage, StorageError,
};

/// What the sandbox does when the next step is executed
#[derive(Debug, Clone)]
pub enum Scripted {
    /// The step ran; the listed files appear in the sandbox
    Finished {
        result: ExecutionResult,
        writes: Vec<(String, Vec<u8>)>,
    },
    /// The sandbox could not run the step
    EnvironmentFault(String),
}

impl Scripted {
    pub fn finished(result: ExecutionResult) -> Self {
        Scripted::Finished {
            result,
            writes: Vec::new(),
        }
    }

    pub fn writing(mut self, name: &str, content: &[u8]) -> Self {
        if let Scripted::Finished { writes, .. } = &mut self {
            writes.push((name.to_string(), content.to_vec()));
        }
        self
    }
}

pub fn ok_run() -> ExecutionResult {
    ExecutionResult {
        status: ExecutionStatus::Ok,
        time: 0.25,
        wall_time: 0.4,
        memory: 2048,
        exit_code: Some(0),
        ..Default::default()
    }
}

pub fn timed_out_run() -> ExecutionResult {
    ExecutionResult {
        status: ExecutionStatus::TimeLimitExceeded,
        limit_exceeded: LimitExceeded::Time,
        time: 1.02,
        wall_time: 1.1,
        message: Some("Time limit exceeded".to_string()),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
pub struct SandboxState {
    files: Mutex<HashMap<String, (Vec<u8>, bool)>>,
    steps: Mutex<Vec<Step>>,
    script: Mutex<VecDeque<Scripted>>,
    releases: AtomicUsize,
    acquisitions: AtomicUsize,
}

impl SandboxState {
    pub fn file(&self, name: &str) -> Option<(Vec<u8>, bool)> {
        self.files.lock().unwrap().get(name).cloned()
    }

    pub fn steps(&self) -> Vec<Step> {
        self.steps.lock().unwrap().clone()
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn remaining_script(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[derive(Debug)]
pub struct MockProvider {
    state: Arc<SandboxState>,
    fail_acquire: bool,
}

impl MockProvider {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        let state = SandboxState::default();
        state.script.lock().unwrap().extend(script);
        Self {
            state: Arc::new(state),
            fail_acquire: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail_acquire: true,
            ..Self::new([])
        }
    }

    pub fn state(&self) -> &SandboxState {
        &self.state
    }
}

impl SandboxProvider for MockProvider {
    type Sandbox = MockSandbox;

    async fn acquire(&self) -> Result<MockSandbox, SandboxError> {
        if self.fail_acquire {
            return Err(SandboxError::Internal("no boxes left".to_string()));
        }
        self.state.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(MockSandbox {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MockSandbox {
    state: Arc<SandboxState>,
}

impl MockSandbox {
    pub fn standalone(script: impl IntoIterator<Item = Scripted>) -> Self {
        let state = SandboxState::default();
        state.script.lock().unwrap().extend(script);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> &SandboxState {
        &self.state
    }
}

impl Sandbox for MockSandbox {
    async fn write_file(&self, name: &str, content: &[u8], executable: bool) -> Result<(), SandboxError> {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), (content.to_vec(), executable));
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, SandboxError> {
        self.state
            .files
            .lock()
            .unwrap()
            .get(name)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| SandboxError::Io(io::Error::new(io::ErrorKind::NotFound, name.to_string())))
    }

    async fn file_exists(&self, name: &str) -> Result<bool, SandboxError> {
        Ok(self.state.files.lock().unwrap().contains_key(name))
    }

    async fn execute(&self, step: &Step) -> Result<ExecutionResult, SandboxError> {
        self.state.steps.lock().unwrap().push(step.clone());
        let next = self.state.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Finished { result, writes }) => {
                let mut files = self.state.files.lock().unwrap();
                for (name, content) in writes {
                    files.insert(name, (content, false));
                }
                Ok(result)
            }
            Some(Scripted::EnvironmentFault(message)) => Err(SandboxError::Internal(message)),
            None => panic!("unexpected step: {:?}", step.command),
        }
    }

    async fn release(&mut self) -> Result<(), SandboxError> {
        self.state.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockStorage {
    files: Mutex<HashMap<Digest, Vec<u8>>>,
    stored: Mutex<Vec<(Vec<u8>, String)>>,
    read_only: bool,
}

impl MockStorage {
    pub fn with(self, digest: &str, content: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(Digest::from(digest), content.to_vec());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Contents and descriptions passed to `store`, in order
    pub fn stored(&self) -> Vec<(Vec<u8>, String)> {
        self.stored.lock().unwrap().clone()
    }
}

impl Storage for MockStorage {
    async fn fetch(&self, digest: &Digest) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .unwrap()
            .get(digest)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(digest.clone()))
    }

    async fn store(&self, content: &[u8], description: &str) -> Result<Digest, StorageError> {
        if self.read_only {
            return Err(StorageError::Io(io::Error::other("read-only storage")));
        }
        let mut stored = self.stored.lock().unwrap();
        stored.push((content.to_vec(), description.to_string()));
        let digest = Digest::new(format!("stored-{}", stored.len()));
        self.files
            .lock()
            .unwrap()
            .insert(digest.clone(), content.to_vec());
        Ok(digest)
    }
}
