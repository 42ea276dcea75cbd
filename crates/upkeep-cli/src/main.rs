mod completion;
mod config;
mod dispatch;
mod logging;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use crate::dispatch::run_cli;

#[derive(Parser, Debug)]
#[command(name = "upkeep")]
#[command(about = "Refresh, list and install package updates through a helper process", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    helper: Option<PathBuf>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Refresh,
    List {
        #[arg(long)]
        refresh: bool,
        #[arg(long)]
        json: bool,
    },
    Install {
        refs: Vec<String>,
        #[arg(long, conflicts_with = "refs")]
        all: bool,
        #[arg(long)]
        dry_run: bool,
    },
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CliCompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}
