use cluster_bootstrap::cli::Cli;
use cluster_bootstrap::commands::{execute_command, Outcome};
use clap::Parser;
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Set up colored output
    if cli.no_color {
        colored::control::set_override(false);
    }

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_ansi(!cli.no_color)
        .with_target(false)
        .init();

    match execute_command(&cli).await {
        Ok(Outcome::Completed(_)) => {
            println!("{}", "Done.".bright_green().bold());
        }
        Ok(Outcome::Rejected) => {}
        Err(e) => {
            eprintln!("{} {}", "Error:".bright_red().bold(), e);
            process::exit(1);
        }
    }
}
