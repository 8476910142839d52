//! Rochambeau CLI
//!
//! Evaluates rock-paper-scissors submissions in IOI isolate sandboxes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rochambeau::{
    Config, EXAMPLE_CONFIG, EvaluationJob, Evaluator, IsolateProvider, LocalStorage, Storage,
    prepare_cgroup,
};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rochambeau")]
#[command(about = "Sandboxed evaluation of rock-paper-scissors submissions")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// First box ID to use (overrides the configured pool)
    #[arg(short = 'b', long, global = true)]
    box_id: Option<u32>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: rochambeau.toml)
        #[arg(short, long, default_value = "rochambeau.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Put a file into storage and print its digest
    Store {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Evaluate a job described by a JSON file
    Evaluate {
        #[arg(value_name = "JOB")]
        job: PathBuf,

        /// Write the evaluated job here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available languages
    Languages,

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    if let Some(box_id) = cli.box_id {
        config.pool.first_box_id = box_id;
    }

    // Set up cgroup hierarchy if cgroup mode is enabled
    if config.cgroup {
        match prepare_cgroup(&config.cg_root) {
            Ok(true) => debug!("cgroup hierarchy ready"),
            Ok(false) => {
                warn!(
                    "cgroup support unavailable (memory controller not found), falling back to RLIMIT_AS"
                );
                config.cgroup = false;
            }
            Err(e) => {
                warn!("cgroup setup failed: {e}, falling back to RLIMIT_AS memory limiting");
                config.cgroup = false;
            }
        }
    }

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Store { file } => store_file(&config, &file).await,
        Commands::Evaluate { job, output } => evaluate(config, &job, output.as_deref()).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn store_file(config: &Config, file: &Path) -> Result<()> {
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read '{}'", file.display()))?;

    let storage = LocalStorage::new(&config.storage_root);
    let digest = storage
        .store(&content, &file.display().to_string())
        .await
        .context("failed to store file")?;

    println!("{digest}");
    Ok(())
}

async fn evaluate(config: Config, job_path: &Path, output: Option<&Path>) -> Result<()> {
    let raw = tokio::fs::read_to_string(job_path)
        .await
        .context("failed to read job file")?;
    let mut job: EvaluationJob = serde_json::from_str(&raw).context("failed to parse job file")?;

    let config = Arc::new(config);
    let storage = LocalStorage::new(&config.storage_root);
    let evaluator = Evaluator::new(IsolateProvider::new(Arc::clone(&config)), storage, config);

    evaluator.evaluate(&mut job).await;

    let rendered = serde_json::to_string_pretty(&job).context("failed to serialize job")?;
    match output {
        Some(path) => tokio::fs::write(path, rendered + "\n")
            .await
            .context("failed to write evaluated job")?,
        None => println!("{rendered}"),
    }

    // Log metrics via tracing (stderr), keeping stdout clean for piping
    if let Some(plus) = &job.plus {
        info!(
            status = ?plus.status,
            time = format_args!("{:.3}s", plus.time),
            wall_time = format_args!("{:.3}s", plus.wall_time),
            memory = format_args!("{} KB", plus.memory),
            "contestant run"
        );
    }

    if job.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    let mut languages: Vec<_> = config.languages.iter().collect();
    languages.sort_by_key(|(id, _)| *id);

    for (id, lang) in languages {
        println!("  {:<15} {} ({:?})", id, lang.name, lang.runtime);
    }
}

fn show_config(config: &Config) {
    println!("Default resource limits:");
    println!("  Time limit: {:?}", config.default_limits.time_limit);
    println!(
        "  Wall time limit: {:?}",
        config.default_limits.wall_time_limit
    );
    println!(
        "  Memory limit: {:?} KB",
        config.default_limits.memory_limit
    );
    println!("  Stack limit: {:?} KB", config.default_limits.stack_limit);
    println!("  Max processes: {:?}", config.default_limits.max_processes);
    println!();
    println!("Isolate binary: {}", config.isolate_binary().display());
    println!(
        "Box pool: {} box(es) starting at {}",
        config.pool.boxes, config.pool.first_box_id
    );
    println!("Judge: {}", config.evaluation.judge_path.display());
    println!(
        "Stored output limit: {} bytes",
        config.evaluation.user_output_limit
    );
    println!("Storage root: {}", config.storage_root.display());
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
