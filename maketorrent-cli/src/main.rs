//! maketorrent - create BitTorrent metainfo files from the command line

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use maketorrent_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "maketorrent")]
#[command(about = "Create BitTorrent metainfo files from files and directories")]
#[command(version)]
struct Cli {
    /// Report progress while creating
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Report every file and piece
    #[arg(short, long, global = true)]
    debug: bool,
    /// Also write trace-level logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = CliLogLevel::from_flags(cli.verbose, cli.debug);
    if let Err(e) = init_tracing(level.as_tracing_level(), cli.log_file.as_deref()) {
        eprintln!("error: could not set up logging: {e}");
        return ExitCode::FAILURE;
    }

    match commands::handle_command(cli.command).await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
