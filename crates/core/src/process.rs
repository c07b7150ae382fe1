//! The agent process abstraction.
//!
//! A process handle yields [`AgentStreamEvent`]s in arrival order, accepts
//! tool results for locally executed tools, and can be killed. The concrete
//! Claude CLI transport lives in `clive-process`; tests script handles in
//! memory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProcessError;

/// One event from the agent's incremental output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial assistant text.
    TextDelta { content: String },

    /// Partial reasoning text.
    ThinkingDelta { content: String },

    /// Fired once per tool call before its first argument delta.
    ToolCallStreamingStart {
        tool_call_id: String,
        tool_name: String,
    },

    /// A fragment of the tool call's JSON arguments.
    ToolCallDelta {
        tool_call_id: String,
        tool_name: String,
        delta: String,
    },

    /// A tool call with complete arguments.
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },

    /// The outcome of a tool call.
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        output: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },

    /// The agent reported an error; the stream may continue.
    Error { message: String },

    /// End of stream.
    Done,
}

impl AgentStreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::ThinkingDelta { .. } => "thinking_delta",
            Self::ToolCallStreamingStart { .. } => "tool_call_streaming_start",
            Self::ToolCallDelta { .. } => "tool_call_delta",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }
}

/// A running agent process.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Next event, `None` once the stream has ended.
    async fn next_event(&mut self) -> Option<Result<AgentStreamEvent, ProcessError>>;

    /// Forward a locally produced tool result back to the agent.
    async fn send_result(&mut self, tool_call_id: &str, content: &str) -> Result<(), ProcessError>;

    /// Terminate the process. Must be idempotent and never fail.
    fn kill(&mut self);
}

/// Starts a fresh agent process for one iteration.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(&self, prompt: &str) -> Result<Box<dyn ProcessHandle>, ProcessError>;
}
