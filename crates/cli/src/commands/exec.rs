//! `clive exec`: one agent process, one execution loop pass.

use super::runtime;
use clive_core::{AgentState, Message, ProcessHandle};
use clive_process::{ClaudeCliProcess, CliOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

pub async fn run(
    workspace: Option<PathBuf>,
    config_path: Option<&Path>,
    prompt: &str,
) -> anyhow::Result<ExitCode> {
    let workspace = runtime::resolve_workspace(workspace)?;
    let config = runtime::load_config(config_path, &workspace)?;
    let execution = runtime::execution_loop(&config, &workspace, runtime::stdout_emitter());

    let options = CliOptions::from_config(&config.cli, &workspace);
    let mut process = ClaudeCliProcess::spawn(&options, prompt).await?;
    let mut agent = AgentState::default();
    agent.push_message(Message::user(prompt));

    let result = execution
        .run(&mut process, &mut agent, &runtime::cancel_on_ctrl_c())
        .await;
    process.kill();

    if let Some(error) = &result.error {
        warn!("Agent run failed: {error}");
    }
    info!(
        success = result.success,
        cancelled = result.cancelled,
        files = result.executions.len(),
        "Agent run finished"
    );
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
