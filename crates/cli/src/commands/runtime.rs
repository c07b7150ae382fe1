//! Wiring shared by the commands that run the agent.

use anyhow::Context;
use clive_agent::{Collaborators, ExecutionLoop, ProgressEmitter};
use clive_config::AppConfig;
use clive_tools::{FsPlanWriter, FsTestFileWriter, LocalToolExecutor};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The workspace root, canonicalized. Defaults to the current directory.
pub fn resolve_workspace(workspace: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let dir = match workspace {
        Some(dir) => dir,
        None => std::env::current_dir().context("Cannot read the current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("Workspace {} is not accessible", dir.display()))
}

/// Load config from an explicit file, else from the workspace or user file.
pub fn load_config(explicit: Option<&Path>, workspace: &Path) -> anyhow::Result<AppConfig> {
    let config = match explicit {
        Some(path) => AppConfig::load_from(path)?.with_env_overrides()?,
        None => AppConfig::load(workspace)?,
    };
    Ok(config)
}

/// Prints every progress event's JSON payload as one stdout line.
pub fn stdout_emitter() -> ProgressEmitter {
    ProgressEmitter::new(Arc::new(|_event_type: &str, payload: &str| {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{payload}").and_then(|_| out.flush()) {
            warn!("Failed to write progress event: {e}");
        }
    }))
}

/// An execution loop backed by the filesystem and the local tools.
pub fn execution_loop(
    config: &AppConfig,
    workspace: &Path,
    emitter: ProgressEmitter,
) -> ExecutionLoop {
    let collaborators = Collaborators::new(
        Arc::new(FsTestFileWriter::new(workspace)),
        Arc::new(FsPlanWriter::new(workspace)),
    )
    .with_tool_executor(Arc::new(LocalToolExecutor::new(workspace)));

    ExecutionLoop::new(collaborators, emitter)
        .with_plans_dir(config.plans.dir.clone())
        .with_mistake_limit(config.agent.mistake_limit)
}

/// A token cancelled by the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping the agent");
            child.cancel();
        }
    });
    token
}
