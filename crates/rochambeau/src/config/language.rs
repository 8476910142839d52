use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::evaluation::RuntimeClass;
use crate::types::MountConfig;

/// Configuration for a submission language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "C++17 / g++")
    pub name: String,

    /// Runtime family, used to pick process and memory adjustments
    #[serde(default)]
    pub runtime: RuntimeClass,

    /// How the contestant's executable is started under the judge
    pub run: RunConfig,
}

impl Language {
    /// Expand placeholders in the run command
    ///
    /// `{binary}` becomes the executable's file name and `{memory}` the
    /// declared memory limit in MB, for runtimes that limit their own heap.
    pub fn evaluation_command(&self, binary: &str, memory_mb: u64) -> Vec<String> {
        expand_command(&self.run.command, binary, memory_mb)
    }

    /// Environment the contestant step runs with, PATH included
    pub fn step_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<_> = self
            .run
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.sort();
        env.push(("PATH".to_owned(), self.run.path.clone()));
        env
    }
}

fn expand_command(command: &[String], binary: &str, memory_mb: u64) -> Vec<String> {
    let memory = memory_mb.to_string();
    command
        .iter()
        .map(|arg| arg.replace("{binary}", binary).replace("{memory}", &memory))
        .collect()
}

/// Default PATH for sandbox execution
pub const DEFAULT_SANDBOX_PATH: &str = "/usr/bin:/bin";

/// Configuration for the contestant run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {binary}, {memory}
    pub command: Vec<String>,

    /// Environment Variables to set
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Directory mounts
    #[serde(default)]
    pub mounts: Vec<MountConfig>,

    /// PATH environment variable for the sandbox
    ///
    /// Defaults to "/usr/bin:/bin" if not specified.
    #[serde(default = "default_sandbox_path")]
    pub path: String,
}

fn default_sandbox_path() -> String {
    DEFAULT_SANDBOX_PATH.to_owned()
}
