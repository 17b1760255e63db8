//! Multi-round code generation CLI.
//!
//! `genloop run` drives the generator/reviewer rounds into a fresh project
//! directory; `genloop repair` fixes malformed file names in an existing one.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgGroup, Parser, Subcommand};

use genloop::exit_codes;
use genloop::io::collaborator::CommandCollaborator;
use genloop::io::config::{CONFIG_FILE_NAME, PipelineConfig, load_config, write_config};
use genloop::io::history_store::load_compact_history;
use genloop::io::layout::{COMPACT_HISTORY_FILE, create_project_dir};
use genloop::io::repair::{render_report, repair};
use genloop::logging;
use genloop::pipeline::{PipelineStop, RunContext, run_pipeline};
use genloop::presets;

/// Preset used when no task source is given.
const DEFAULT_PRESET: &str = "data_analyzer";

#[derive(Parser)]
#[command(
    name = "genloop",
    version,
    about = "Generate a multi-file project through generator/reviewer rounds"
)]
struct Cli {
    /// Raise log verbosity (`-v` info, `-vv` debug). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `genloop.toml`.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
    },
    /// Run every round and write the project directory.
    #[command(group(ArgGroup::new("task_source").args(["task", "task_file", "preset"])))]
    Run {
        /// Task description.
        #[arg(long)]
        task: Option<String>,
        /// Read the task description from a file.
        #[arg(long)]
        task_file: Option<PathBuf>,
        /// Built-in task (`data_analyzer`, `web_scraper`, `api_server`).
        #[arg(long)]
        preset: Option<String>,
        /// Override the configured number of rounds.
        #[arg(long)]
        rounds: Option<u32>,
        /// Override the configured output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
    },
    /// Validate and print a project's `generation_history.json`.
    History {
        /// Project directory.
        dir: PathBuf,
    },
    /// Rename malformed files under a directory in place.
    Repair {
        dir: PathBuf,
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(command: Command) -> Result<i32> {
    match command {
        Command::Init { force, config } => cmd_init(&config, force),
        Command::Run {
            task,
            task_file,
            preset,
            rounds,
            output_dir,
            config,
        } => {
            let task = resolve_task(task, task_file.as_deref(), preset.as_deref())?;
            let mut cfg = load_config(&config)?;
            if let Some(rounds) = rounds {
                cfg.rounds = rounds;
            }
            if let Some(output_dir) = output_dir {
                cfg.output_dir = output_dir;
            }
            cmd_run(task, cfg)
        }
        Command::History { dir } => cmd_history(&dir),
        Command::Repair { dir, config } => cmd_repair(&dir, &config),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &PipelineConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn resolve_task(
    task: Option<String>,
    task_file: Option<&Path>,
    preset: Option<&str>,
) -> Result<String> {
    if let Some(task) = task {
        return non_empty(task);
    }
    if let Some(path) = task_file {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read task {}", path.display()))?;
        return non_empty(contents);
    }
    let name = preset.unwrap_or(DEFAULT_PRESET);
    presets::find(name)
        .map(|preset| preset.task.to_string())
        .ok_or_else(|| {
            anyhow!(
                "unknown preset {name:?} (available: {})",
                presets::names().join(", ")
            )
        })
}

fn non_empty(task: String) -> Result<String> {
    if task.trim().is_empty() {
        bail!("task must not be empty");
    }
    Ok(task)
}

fn cmd_run(task: String, cfg: PipelineConfig) -> Result<i32> {
    cfg.validate()?;
    let paths = create_project_dir(&cfg.output_dir, cfg.naming.round_dir_width)?;
    println!("project {}", paths.root.display());

    let mut collaborator = CommandCollaborator::new(cfg.collaborator.clone())?;
    let ctx = RunContext::new(task, cfg, paths)?;
    let outcome = run_pipeline(ctx, &mut collaborator, |round| {
        println!(
            "round {}: {} file(s) in {}",
            round.round,
            round.files.len(),
            round.dir.display()
        );
        for failure in &round.write_failures {
            println!("  failed {}: {}", failure.name, failure.reason);
        }
    })?;

    if let Some(snapshot) = &outcome.final_snapshot {
        println!(
            "final: {} file(s) from round {}",
            snapshot.files.len(),
            snapshot.round
        );
    }
    match outcome.stop {
        PipelineStop::Completed => Ok(exit_codes::OK),
        PipelineStop::Aborted { round, reason } => {
            eprintln!("aborted in round {round}: {reason}");
            Ok(exit_codes::ABORTED)
        }
    }
}

fn cmd_history(dir: &Path) -> Result<i32> {
    let history = load_compact_history(&dir.join(COMPACT_HISTORY_FILE))?;
    let mut buf = serde_json::to_string_pretty(&history).context("serialize history")?;
    buf.push('\n');
    print!("{buf}");
    Ok(exit_codes::OK)
}

fn cmd_repair(dir: &Path, config: &Path) -> Result<i32> {
    let cfg = load_config(config)?;
    let report = repair(dir, &cfg.sanitizer()?)?;
    print!("{}", render_report(&report));
    Ok(exit_codes::OK)
}
