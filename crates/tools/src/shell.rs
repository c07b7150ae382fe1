//! `bashExecute`: run a shell command in the workspace.

use async_trait::async_trait;
use clive_core::error::ToolError;
use clive_core::tool::{BASH_EXECUTE, Tool, ToolResult};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Executes shell commands with the workspace as working directory.
pub struct BashExecuteTool {
    workspace: PathBuf,
    timeout: Duration,
}

impl BashExecuteTool {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for BashExecuteTool {
    fn name(&self) -> &str {
        BASH_EXECUTE
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace and return stdout/stderr. Use this to run tests and inspect the project."
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        debug!(command = %command, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        };
        cmd.current_dir(&self.workspace).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(output) => output,
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool_name: BASH_EXECUTE.into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let code = output.status.code().unwrap_or(-1);

                let result_text = if output.status.success() {
                    if stderr.is_empty() {
                        stdout
                    } else {
                        format!("{stdout}\n[stderr]: {stderr}")
                    }
                } else {
                    warn!(command = %command, exit_code = code, "Command failed");
                    format!("[exit code: {code}]\n{stdout}\n{stderr}")
                };

                let result = if output.status.success() {
                    ToolResult::ok(result_text.trim())
                } else {
                    ToolResult::failed(result_text.trim())
                };
                Ok(result.with_data(serde_json::json!({
                    "command": command,
                    "exitCode": code,
                })))
            }
            Err(e) => Err(ToolError::ExecutionFailed {
                tool_name: BASH_EXECUTE.into(),
                reason: e.to_string(),
            }),
        }
    }
}
