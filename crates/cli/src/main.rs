//! clive CLI, the main entry point.
//!
//! Commands:
//! - `run`: iterate fresh agent processes until the task completes
//! - `exec`: one agent process, one prompt
//! - `config`: show or initialize configuration
//!
//! Progress events go to stdout as NDJSON. Logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(
    name = "clive",
    about = "Drive a coding agent to write tests, streaming progress as NDJSON",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the workspace or user config
    #[arg(long = "config", global = true, env = "CLIVE_CONFIG")]
    config_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the iteration loop until the task completes
    Run {
        /// Workspace root (defaults to the current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Approved test plan the agent should follow
        #[arg(short, long)]
        plan: Option<String>,

        /// Task description added to every iteration prompt
        #[arg(short, long)]
        task: Option<String>,

        /// Override `loop.max_iterations`
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Run a single agent process with a prompt
    Exec {
        #[arg(short, long)]
        prompt: String,

        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show {
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// Write a default config to `<workspace>/.clive/config.toml`
    Init {
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays a clean event stream
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = cli.config_file.as_deref();
    match cli.command {
        Commands::Run {
            workspace,
            plan,
            task,
            max_iterations,
        } => {
            let options = commands::run::RunOptions {
                plan,
                task,
                max_iterations,
            };
            commands::run::run(workspace, config, options).await
        }
        Commands::Exec { prompt, workspace } => {
            commands::exec::run(workspace, config, &prompt).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { workspace } => commands::config_cmd::show(workspace, config),
            ConfigAction::Init { workspace, force } => commands::config_cmd::init(workspace, force),
        },
    }
}
