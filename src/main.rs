mod cli;
mod config;
mod eligibility;
mod error;
mod git;
mod github;
mod lifecycle;
mod pipeline;
mod process;
mod rebase_todo;
mod reconcile;
mod status;
mod sync;
mod workspace;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level(&cli).into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn log_level(cli: &Cli) -> tracing::Level {
    if cli.verbose {
        tracing::Level::DEBUG
    } else {
        cli.command.default_level()
    }
}
