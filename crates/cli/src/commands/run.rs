//! `clive run`: the iteration loop.

use super::runtime;
use clive_agent::{IterationLoop, LoopCompleteReason, PromptContext};
use clive_process::{ClaudeCliSpawner, CliOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

pub struct RunOptions {
    pub plan: Option<String>,
    pub task: Option<String>,
    pub max_iterations: Option<u32>,
}

pub async fn run(
    workspace: Option<PathBuf>,
    config_path: Option<&Path>,
    options: RunOptions,
) -> anyhow::Result<ExitCode> {
    let workspace = runtime::resolve_workspace(workspace)?;
    let config = runtime::load_config(config_path, &workspace)?;
    let max_iterations = options
        .max_iterations
        .unwrap_or(config.iteration.max_iterations);

    let spawner = ClaudeCliSpawner::new(CliOptions::from_config(&config.cli, &workspace));
    let execution = runtime::execution_loop(&config, &workspace, runtime::stdout_emitter());
    let context = PromptContext {
        workspace_root: workspace.display().to_string(),
        plan_path: options.plan,
        task: options.task,
    };

    info!(
        workspace = %workspace.display(),
        binary = %config.cli.binary,
        max_iterations,
        "Starting agent loop"
    );
    let outcome = IterationLoop::new(Arc::new(spawner), execution, context)
        .with_max_iterations(max_iterations)
        .run(&runtime::cancel_on_ctrl_c())
        .await;

    info!(
        reason = %outcome.reason,
        iterations = outcome.iteration,
        files = outcome.executions.len(),
        completed = outcome.progress.completed,
        total = outcome.progress.total,
        "Agent loop finished"
    );
    Ok(if outcome.reason == LoopCompleteReason::Complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
