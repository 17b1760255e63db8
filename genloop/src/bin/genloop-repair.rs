//! Standalone repair pass: `genloop-repair <DIR>`.
//!
//! Renames malformed file names under DIR in place and prints what changed.
//! Exits 0 on success (even when nothing was renamed) and 1 when DIR is
//! missing, not a directory, or not writable.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;

use genloop::exit_codes;
use genloop::io::config::{CONFIG_FILE_NAME, load_config};
use genloop::io::repair::{render_report, repair};
use genloop::logging;

#[derive(Parser)]
#[command(
    name = "genloop-repair",
    version,
    about = "Fix malformed file names in a generated project tree"
)]
struct Cli {
    /// Directory to repair (a project or a single round directory).
    dir: PathBuf,
    /// Config providing the label list and default extension.
    #[arg(long, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,
}

fn main() {
    logging::init(0);
    let cli = Cli::parse();
    if let Err(err) = run(&cli.dir, &cli.config) {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::INVALID);
    }
}

fn run(dir: &Path, config: &Path) -> Result<()> {
    let cfg = load_config(config)?;
    let report = repair(dir, &cfg.sanitizer()?)?;
    print!("{}", render_report(&report));
    Ok(())
}
