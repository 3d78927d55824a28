//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// modhost - load and manage archive-packaged modules
#[derive(Parser)]
#[command(name = "modhost")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Host data directory; modules live in its `modules` subdirectory
    #[arg(short = 'd', long, global = true, env = "MODHOST_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Host configuration file (defaults to `<data-dir>/modhost.yml` when present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load every module and keep them running until Ctrl-C
    Run,

    /// Load every module and print what was loaded
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Apply updates staged by an interrupted run, without loading anything
    Finalize,

    /// Load every module and apply available remote updates
    CheckUpdates,
}
