mod cli;
mod commands;
mod config;
mod error;
mod logging;

use clap::Parser;
use cli::{Cli, Commands};
use error::{CliError, Result};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|error| {
                CliError::Argument(format!("failed to configure the thread pool: {error}"))
            })?;
    }

    match cli.command {
        Commands::Search(args) => commands::search::run(args),
    }
}
