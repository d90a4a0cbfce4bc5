use colored::*;
use thiserror::Error;

use crate::cli::Cli;
use crate::client::RespClient;
use crate::config::ClusterConfig;
use crate::error::{Stage, StageFailure};
use crate::lifecycle::TokioSpawner;
use crate::orchestrator::{BootstrapCommand, Orchestrator, RunFailure, RunReport};
use crate::types::Role;
use crate::topology::planner;

/// How a command invocation ended, short of a fatal error
#[derive(Debug)]
pub enum Outcome {
    Completed(RunReport),
    /// Unknown `--command`; usage was printed
    Rejected,
}

/// Fatal errors surfaced to `main`
#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Invalid(StageFailure),

    #[error(transparent)]
    Run(Box<RunFailure>),
}

impl CommandError {
    pub fn stage(&self) -> Stage {
        match self {
            CommandError::Invalid(failure) => failure.stage,
            CommandError::Run(failure) => failure.stage(),
        }
    }
}

pub async fn execute_command(cli: &Cli) -> Result<Outcome, CommandError> {
    let Some(command) = BootstrapCommand::from_name(&cli.command) else {
        println!(
            "{} {}, commands: {:?}",
            "invalid command".bright_yellow(),
            cli.command,
            BootstrapCommand::NAMES
        );
        return Ok(Outcome::Rejected);
    };

    let config = cli
        .settings()
        .and_then(|settings| settings.validate())
        .map_err(|e| CommandError::Invalid(StageFailure::new(Stage::Validate, e)))?;

    print_plan(&config, command);

    let client = RespClient::new(config.call_timeout);
    let spawner = TokioSpawner;
    let orchestrator = Orchestrator::new(&config, &spawner, &client);

    match orchestrator.run(command).await {
        Ok(report) => {
            print_report(&report, cli.json);
            Ok(Outcome::Completed(report))
        }
        Err(failure) => {
            print_report(&failure.report, cli.json);
            Err(CommandError::Run(Box::new(failure)))
        }
    }
}

fn print_plan(config: &ClusterConfig, command: BootstrapCommand) {
    println!(
        "{} {} nodes from {}:{} ({} masters, {} replicas each), up to stage {}",
        "Bootstrapping:".bright_green(),
        config.node_count,
        config.host,
        config.base_port,
        config.master_count(),
        config.replica_count,
        command.last_stage()
    );

    for index in config.indices() {
        let role = match planner::role_of(index, config.node_count, config.replica_count) {
            Some(Role::Master) => "master".bright_blue().to_string(),
            Some(Role::Replica { of, .. }) => format!("replica of {}", config.port_of(of)),
            None => continue,
        };
        println!("  {} {}", config.port_of(index).to_string().bold(), role);
    }
}

fn print_report(report: &RunReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("{} cannot encode report: {}", "Warning:".bright_yellow(), e),
        }
        return;
    }

    if let Some(stage) = report.stage_reached {
        println!("{} {}", "Reached stage:".bright_green(), stage);
    }
    for pair in &report.assignment {
        println!("  {}", pair);
    }
    if report.nodes_left_running {
        println!("{} {} nodes left running", "Note:".bright_cyan(), report.nodes_launched);
    }
    if !report.removed_artifacts.is_empty() {
        println!(
            "{} {} files",
            "Removed:".bright_green(),
            report.removed_artifacts.len()
        );
    }
    for skip in &report.skipped_lines {
        println!(
            "{} listing line {} skipped: {}",
            "Warning:".bright_yellow(),
            skip.line_number,
            skip.reason
        );
    }
    for warning in &report.warnings {
        println!("{} {}", "Warning:".bright_yellow(), warning);
    }
}
