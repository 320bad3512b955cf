mod commands;

use clap::Parser;
use colored::Colorize;
use qna::cli::{Cli, Commands};
use qna::config::{Config, Overrides};
use qna::error::Result;

use commands::add::cmd_add;
use commands::ask::cmd_ask;
use commands::serve::cmd_serve;
use commands::stats::cmd_stats;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&Overrides {
        store: cli.store,
        provider: cli.provider,
    })?;

    match cli.command {
        Commands::Add { text } => cmd_add(&config, &text),
        Commands::Ask { question, top } => cmd_ask(&config, &question, top),
        Commands::Stats => cmd_stats(&config),
        Commands::Serve { ephemeral } => cmd_serve(&config, ephemeral),
    }
}

/// Diagnostics go to stderr so stdout stays clean for answers and responses
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
