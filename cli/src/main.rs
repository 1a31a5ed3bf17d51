//! Rollback CLI - inspect, revert and re-apply checkpointed file changes.
//!
//! ```text
//! main() -> Parsed::from_args -> RollbackConfig::load_for_project -> CheckpointEngine::open
//!                                                                  |
//!                                                                  v
//!                                                  EngineHandle (blocking pool) -> command
//! ```
//!
//! Exit status is non-zero on any error and on partially failed reverts.

mod args;
mod output;

use std::{
    env,
    fs::{self, OpenOptions},
    io::{self, Read as _},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Mutex,
};

use anyhow::{Context, Result};
use rollback_engine::{CheckpointEngine, EngineHandle, RollbackConfig};
use rollback_types::{RevertReport, ToolInvocation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use args::{Args, Command, Parsed, USAGE};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::debug!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Without a log file, stay silent rather than mixing logs into command output.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.rollback/logs/rollback.log
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".rollback").join("logs").join("rollback.log"));
    }

    // Fallback: the system temp dir (home may be read-only in sandboxes)
    candidates.push(env::temp_dir().join("rollback").join("rollback.log"));

    candidates
}

fn project_root(explicit: Option<&Path>) -> Result<PathBuf> {
    let root = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir().context("Failed to read current directory")?,
    };
    std::path::absolute(&root)
        .with_context(|| format!("Failed to resolve project directory {}", root.display()))
}

fn read_invocation() -> Result<ToolInvocation> {
    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .context("Failed to read tool invocation from stdin")?;
    serde_json::from_str(&raw).context("Tool invocation must be JSON {\"name\", \"input\"}")
}

fn report_exit(report: &RevertReport) -> ExitCode {
    print!("{}", output::report(report));
    if report.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let root = project_root(args.project.as_deref())?;
    let config = RollbackConfig::load_for_project(&root)?;
    let handle = EngineHandle::new(CheckpointEngine::open(&root, &config));

    match args.command {
        Command::Record(at) => {
            let invocation = read_invocation()?;
            match handle
                .record_tool_call(&at.session, &at.message, invocation)
                .await?
            {
                Some(id) => println!("{id}"),
                None => println!("no checkpoint"),
            }
        }
        Command::Resolve { id, path } => {
            let path = root.join(path);
            let outcome = handle.resolve_pending(id, path).await?;
            println!("{}", output::outcome_line(&outcome));
        }
        Command::ResolveTurn(at) => {
            for outcome in handle
                .resolve_pending_for_message(&at.session, &at.message)
                .await?
            {
                println!("{}", output::outcome_line(&outcome));
            }
        }
        Command::List(at) => {
            for checkpoint in handle.list_checkpoints(&at.session, &at.message).await? {
                println!("{}", output::checkpoint_line(&checkpoint));
            }
        }
        Command::Window(at) => {
            for checkpoint in handle.window_checkpoints(&at.session, &at.message).await? {
                println!("{}", output::checkpoint_line(&checkpoint));
            }
        }
        Command::Pending(at) => {
            for checkpoint in handle.list_pending(&at.session, &at.message).await? {
                println!("{}", output::checkpoint_line(&checkpoint));
            }
        }
        Command::HasChanges(at) => {
            println!("{}", handle.has_file_changes(&at.session, &at.message).await?);
        }
        Command::Revert(at) => {
            return Ok(report_exit(&handle.revert(&at.session, &at.message).await?));
        }
        Command::Unrevert(at) => {
            return Ok(report_exit(
                &handle.unrevert(&at.session, &at.message).await?,
            ));
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match Parsed::from_args(env::args().skip(1)) {
        Ok(Parsed::Run(args)) => args,
        Ok(Parsed::Help) => {
            print!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
