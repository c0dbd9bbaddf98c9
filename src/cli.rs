//! CLI interface for transync.
//!
//! Every subcommand is non-interactive and meant to run unattended from a
//! scheduler. Progress is logged to stderr; results go to stdout, or to
//! `--out` as JSON.

mod format;

use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use jiff::Timestamp;
use serde::Serialize;

use crate::{
    config::Config,
    eligibility::{self, LanguageTask},
    error::{Result, SyncError},
    github::GitHub,
    pipeline::Pipeline,
    process::SystemRunner,
    rebase_todo, status,
    sync::SequenceEditor,
    workspace::{Workspace, WorkspaceLayout},
};

use format::{format_report, format_stage, format_tasks};

/// Stamp format for dated branch names. Sorts chronologically and is ref-safe.
const STAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Transync: carry reviewed translations from the translation branch to pull requests.
#[derive(Debug, Parser)]
#[command(name = "transync", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Config file. Defaults to ./transync.toml, then the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level. `RUST_LOG` still applies on top.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Typical schedule:
  1. Export language progress from the translation service to status.json
  2. transync eligible                 (see what would be synced)
  3. transync run --out report.json    (sync every eligible language)
  4. transync sync-content             (push new source content to translators)"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync every eligible language and open pull requests.
    ///
    /// Per-language failures are reported but do not change the exit code.
    Run {
        /// Only sync these language codes (still subject to the thresholds).
        #[arg(long = "language", value_name = "CODE")]
        languages: Vec<String>,

        /// Write the JSON run report to this file instead of a summary to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List the languages that meet the progress thresholds.
    Eligible,

    /// Mirror source content into the translations repository.
    SyncContent {
        /// Write the JSON result to this file instead of a summary to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Rewrite a rebase todo file to keep one language's commits.
    ///
    /// Invoked by git as the sequence editor during `run`.
    #[command(hide = true)]
    FilterTodo {
        #[arg(long)]
        language: String,

        file: PathBuf,
    },
}

impl Command {
    /// Default log level. The sequence editor runs inside git and stays quiet.
    pub fn default_level(&self) -> tracing::Level {
        match self {
            Self::FilterTodo { .. } => tracing::Level::WARN,
            _ => tracing::Level::INFO,
        }
    }
}

/// Run the CLI. Only fatal errors come back.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::FilterTodo { language, file } => cmd_filter_todo(&language, &file),
        Command::Eligible => {
            let config = Config::load(cli.config.as_deref())?;
            cmd_eligible(&config)
        }
        Command::Run { languages, out } => {
            let config = Config::load(cli.config.as_deref())?;
            cmd_run(&config, &languages, out.as_deref())
        }
        Command::SyncContent { out } => {
            let config = Config::load(cli.config.as_deref())?;
            cmd_sync_content(&config, out.as_deref())
        }
    }
}

fn cmd_filter_todo(language: &str, file: &Path) -> Result<()> {
    let kept = rebase_todo::filter_todo_file(file, language).map_err(|e| {
        SyncError::SequenceEditor(format!("cannot rewrite {}: {e}", file.display()))
    })?;
    tracing::debug!("kept {kept} picks for {language}");
    Ok(())
}

fn eligible_tasks(config: &Config) -> Result<BTreeMap<String, LanguageTask>> {
    let statuses = status::load_statuses(&config.status_file)?;
    Ok(eligibility::eligible(
        &statuses,
        config.min_translation,
        config.min_approval,
    ))
}

fn cmd_eligible(config: &Config) -> Result<()> {
    let tasks = eligible_tasks(config)?;
    if tasks.is_empty() {
        println!("No eligible languages");
        return Ok(());
    }
    print!("{}", format_tasks(&tasks));
    Ok(())
}

/// Keep only the requested codes. An unknown or ineligible code is logged, not fatal.
fn select(
    mut tasks: BTreeMap<String, LanguageTask>,
    only: &[String],
) -> BTreeMap<String, LanguageTask> {
    if only.is_empty() {
        return tasks;
    }
    for code in only {
        if !tasks.contains_key(code) {
            tracing::warn!(language = %code, "not eligible; skipping");
        }
    }
    tasks.retain(|code, _| only.contains(code));
    tasks
}

fn cmd_run(config: &Config, only: &[String], out: Option<&Path>) -> Result<()> {
    let tasks = select(eligible_tasks(config)?, only);
    tracing::info!("{} eligible language(s)", tasks.len());

    let runner = SystemRunner::new(config.command_timeout());
    let github = GitHub::new(&runner);
    let workspace = Workspace::new(WorkspaceLayout::from_config(config), &runner);
    workspace.prepare(&github, config)?;

    let pipeline = Pipeline::new(config, &workspace, &github, sequence_editor()?, stamp());
    let report = pipeline.run(&tasks)?;

    match out {
        Some(path) => {
            write_json(path, &report)?;
            eprintln!(
                "Synced {} language(s), {} failure(s) → {}",
                report.languages.len(),
                report.failures(),
                path.display()
            );
        }
        None => print!("{}", format_report(&report)),
    }
    Ok(())
}

fn cmd_sync_content(config: &Config, out: Option<&Path>) -> Result<()> {
    let runner = SystemRunner::new(config.command_timeout());
    let github = GitHub::new(&runner);
    let workspace = Workspace::new(WorkspaceLayout::from_config(config), &runner);
    workspace.prepare(&github, config)?;

    let pipeline = Pipeline::new(config, &workspace, &github, sequence_editor()?, stamp());
    let result = pipeline.sync_content()?;

    match out {
        Some(path) => {
            write_json(path, &result)?;
            eprintln!("Content sync → {}", path.display());
        }
        None => println!("content: {}", format_stage(&result)),
    }
    Ok(())
}

/// This binary, invoked by git as `filter-todo`.
fn sequence_editor() -> Result<SequenceEditor> {
    let exe = env::current_exe()
        .map_err(|e| SyncError::Config(format!("cannot locate the transync binary: {e}")))?;
    Ok(SequenceEditor::new(&exe))
}

fn stamp() -> String {
    Timestamp::now().strftime(STAMP_FORMAT).to_string()
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
