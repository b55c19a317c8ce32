#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nmls")]
#[command(author, version, about = "List installed node_modules trees and their problems", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// List installed packages as a tree
    #[command(alias = "list")]
    Ls(commands::ls::LsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.log_json);

    let _span = tracing::info_span!("nmls", cwd = %cwd.display()).entered();

    match &cli.command {
        Commands::Version => commands::version::run(),
        Commands::Ls(args) => commands::ls::run(&cwd, args),
    }
}
