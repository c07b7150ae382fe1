//! The Claude CLI as an agent process.
//!
//! The CLI runs in print mode with `stream-json` on both stdin and stdout.
//! A reader task parses stdout into events and forwards them over a channel;
//! stderr is collected for error reporting. Tool results for locally
//! executed tools are written back to stdin as `user` messages.

use crate::parser::{StreamJsonParser, tool_result_message, user_message};
use async_trait::async_trait;
use clive_config::CliConfig;
use clive_core::{AgentStreamEvent, ProcessError, ProcessHandle, ProcessSpawner};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info, trace, warn};

const EVENT_BUFFER: usize = 256;

/// How to launch the CLI.
#[derive(Debug, Clone)]
pub struct CliOptions {
    pub binary: String,
    pub model: Option<String>,
    pub permission_mode: Option<String>,
    pub mcp_config: Option<String>,
    pub extra_args: Vec<String>,
    /// Working directory of the process
    pub workspace: PathBuf,
}

impl CliOptions {
    pub fn from_config(config: &CliConfig, workspace: impl Into<PathBuf>) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.model.clone(),
            permission_mode: config.permission_mode.clone(),
            mcp_config: config.mcp_config.clone(),
            extra_args: config.extra_args.clone(),
            workspace: workspace.into(),
        }
    }

    /// Command-line arguments, without the binary.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-p",
            "--output-format",
            "stream-json",
            "--input-format",
            "stream-json",
            "--verbose",
            "--include-partial-messages",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(model) = &self.model {
            args.extend(["--model".to_string(), model.clone()]);
        }
        if let Some(mode) = &self.permission_mode {
            args.extend(["--permission-mode".to_string(), mode.clone()]);
        }
        if let Some(mcp) = &self.mcp_config {
            args.extend(["--mcp-config".to_string(), mcp.clone()]);
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// A running Claude CLI process.
pub struct ClaudeCliProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    events: mpsc::Receiver<Result<AgentStreamEvent, ProcessError>>,
    stderr: Option<JoinHandle<String>>,
    killed: bool,
    exited: bool,
}

impl ClaudeCliProcess {
    /// Launch the CLI and send `prompt` as the first user message.
    pub async fn spawn(options: &CliOptions, prompt: &str) -> Result<Self, ProcessError> {
        let args = options.args();
        debug!(binary = %options.binary, ?args, "Spawning agent CLI");

        let mut child = Command::new(&options.binary)
            .args(&args)
            .current_dir(&options.workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::Spawn {
                binary: options.binary.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::Io("stdout not captured".into()))?;
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut collected = String::new();
                if let Err(e) = stderr.read_to_string(&mut collected).await {
                    trace!("Stopped reading agent stderr: {e}");
                }
                collected
            })
        });

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            let mut parser = StreamJsonParser::new();
            let mut lines = LinesStream::new(BufReader::new(stdout).lines());
            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        let _ = tx.send(Err(ProcessError::StreamInterrupted(e.to_string()))).await;
                        return;
                    }
                };
                for event in parser.parse_line(&line) {
                    if tx.send(Ok(event)).await.is_err() {
                        return;
                    }
                }
            }
        });

        let mut process = Self {
            child,
            stdin: None,
            events: rx,
            stderr,
            killed: false,
            exited: false,
        };
        process.stdin = process.child.stdin.take();
        process.write_line(&user_message(prompt)).await?;
        info!(pid = ?process.child.id(), "Agent CLI started");
        Ok(process)
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ProcessError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ProcessError::Io("stdin already closed".into()))?;
        stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| ProcessError::Io(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| ProcessError::Io(e.to_string()))
    }

    /// Close stdin so the CLI finishes once the current turn is done.
    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }

    async fn exit_status(&mut self) -> Option<Result<AgentStreamEvent, ProcessError>> {
        let status = match self.child.wait().await {
            Ok(status) => status,
            Err(e) => return Some(Err(ProcessError::Io(e.to_string()))),
        };
        if status.success() {
            debug!("Agent CLI exited cleanly");
            return None;
        }
        let stderr = match self.stderr.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        Some(Err(ProcessError::Exited {
            code: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        }))
    }
}

#[async_trait]
impl ProcessHandle for ClaudeCliProcess {
    async fn next_event(&mut self) -> Option<Result<AgentStreamEvent, ProcessError>> {
        if let Some(event) = self.events.recv().await {
            return Some(event);
        }
        if self.killed || self.exited {
            return None;
        }
        self.exited = true;
        self.exit_status().await
    }

    async fn send_result(&mut self, tool_call_id: &str, content: &str) -> Result<(), ProcessError> {
        self.write_line(&tool_result_message(tool_call_id, content))
            .await
            .map_err(|e| ProcessError::SendFailed {
                tool_call_id: tool_call_id.to_string(),
                reason: e.to_string(),
            })
    }

    fn kill(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;
        self.stdin = None;
        if let Err(e) = self.child.start_kill() {
            debug!("Agent CLI already gone: {e}");
        }
    }
}

/// Spawns one Claude CLI process per iteration.
#[derive(Debug, Clone)]
pub struct ClaudeCliSpawner {
    options: CliOptions,
}

impl ClaudeCliSpawner {
    pub fn new(options: CliOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ProcessSpawner for ClaudeCliSpawner {
    async fn spawn(&self, prompt: &str) -> Result<Box<dyn ProcessHandle>, ProcessError> {
        let process = ClaudeCliProcess::spawn(&self.options, prompt).await?;
        Ok(Box::new(process))
    }
}

impl Drop for ClaudeCliProcess {
    fn drop(&mut self) {
        if !self.killed && !self.exited {
            warn!("Agent CLI handle dropped while running, killing it");
            self.kill();
        }
    }
}
