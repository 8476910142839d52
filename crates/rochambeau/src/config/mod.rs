use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{DEFAULT_SANDBOX_PATH, Language, RunConfig};
use crate::types::{MountConfig, ResourceLimits};

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../rochambeau.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for Rochambeau
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the Isolate binary (uses PATH if not specified).
    #[serde(default)]
    pub isolate_path: Option<PathBuf>,

    /// Use cgroup memory limiting instead of RLIMIT_AS.
    ///
    /// When enabled, isolate uses `--cg` and `--cg-mem` which limit actual memory
    /// usage (RSS) rather than virtual address space.
    #[serde(default)]
    pub cgroup: bool,

    /// Cgroup root path for isolate. Must match isolate's `cg_root` config value.
    #[serde(default = "default_cg_root")]
    pub cg_root: PathBuf,

    /// Range of isolate box IDs jobs may use
    #[serde(default)]
    pub pool: PoolConfig,

    /// Global directory mounts applied to every sandboxed step
    #[serde(default)]
    pub sandbox_mounts: Vec<MountConfig>,

    /// Default resource limits applied to every sandboxed step.
    /// Step limits (from the job and the language's runtime class) override these.
    #[serde(default)]
    pub default_limits: ResourceLimits,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Directory holding content-addressed files
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// First isolate box ID handed out
    #[serde(default)]
    pub first_box_id: u32,

    /// Number of boxes, which is also the number of jobs that can run at once
    #[serde(default = "default_boxes")]
    pub boxes: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            first_box_id: 0,
            boxes: default_boxes(),
        }
    }
}

/// Settings for the game evaluation pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    /// Judge binary that plays the game against the contestant's program
    #[serde(default = "default_judge_path")]
    pub judge_path: PathBuf,

    /// Maximum number of bytes kept when the contestant's output is persisted
    #[serde(default = "default_user_output_limit")]
    pub user_output_limit: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            judge_path: default_judge_path(),
            user_output_limit: default_user_output_limit(),
        }
    }
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            isolate_path: None,
            cgroup: false,
            cg_root: default_cg_root(),
            pool: PoolConfig::default(),
            sandbox_mounts: Vec::new(),
            default_limits: ResourceLimits::default(),
            evaluation: EvaluationConfig::default(),
            storage_root: default_storage_root(),
            languages: HashMap::new(),
        }
    }

    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Get the path to the isolate binary
    pub fn isolate_binary(&self) -> PathBuf {
        self.isolate_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("isolate"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_cg_root() -> PathBuf {
    PathBuf::from("/sys/fs/cgroup/isolate")
}

fn default_boxes() -> u32 {
    1
}

fn default_judge_path() -> PathBuf {
    PathBuf::from("/usr/local/bin/rock_paper_scissors_judge")
}

fn default_user_output_limit() -> usize {
    100 * 1024
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("/var/lib/rochambeau/storage")
}
