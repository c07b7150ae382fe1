//! Progress events handed to the UI layer.
//!
//! Every event serializes to a JSON object whose `type` field matches the
//! name passed as the callback's first argument. The UI treats the events
//! as an append-only log.

use clive_core::{Todo, TodoProgress};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// `tool-call` lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCallState {
    InputStreaming,
    InputAvailable,
}

/// `tool-result` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolResultState {
    OutputAvailable,
    OutputError,
    OutputDenied,
    OutputCancelled,
}

/// Coarse classification of a shell command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Running,
    Reading,
    Scanning,
    Executing,
}

/// Why the iteration loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopCompleteReason {
    Complete,
    MaxIterations,
    Error,
    Cancelled,
}

impl LoopCompleteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::MaxIterations => "max_iterations",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for LoopCompleteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    #[serde(rename = "content_streamed")]
    ContentStreamed { content: String },

    #[serde(rename = "reasoning")]
    Reasoning { content: String },

    #[serde(rename = "tool-call")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<serde_json::Value>,
        state: ToolCallState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_mcp_tool: Option<bool>,
    },

    #[serde(rename = "tool-result")]
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        output: serde_json::Value,
        state: ToolResultState,
    },

    #[serde(rename = "tool-skipped")]
    ToolSkipped {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        reason: String,
    },

    #[serde(rename = "command-status")]
    CommandStatus {
        tool_call_id: String,
        command: String,
        status: CommandStatus,
    },

    #[serde(rename = "plan-content-streaming")]
    PlanContentStreaming {
        tool_call_id: String,
        content: String,
        is_complete: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },

    #[serde(rename = "file-created")]
    FileCreated {
        tool_call_id: String,
        file_path: String,
    },

    #[serde(rename = "native-plan-mode-entered")]
    NativePlanModeEntered { tool_call_id: String },

    #[serde(rename = "native-plan-mode-exiting")]
    NativePlanModeExiting {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plan_file_path: Option<String>,
    },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "diagnostic-problems")]
    DiagnosticProblems {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
    },

    #[serde(rename = "mistake-limit")]
    MistakeLimit { count: u32, message: String },

    #[serde(rename = "todos-updated")]
    TodosUpdated {
        todos: Vec<Todo>,
        progress: TodoProgress,
    },

    #[serde(rename = "loop-iteration-start")]
    LoopIterationStart { iteration: u32, max_iterations: u32 },

    #[serde(rename = "loop-iteration-complete")]
    LoopIterationComplete {
        iteration: u32,
        todos: Vec<Todo>,
        progress: TodoProgress,
    },

    #[serde(rename = "loop-complete")]
    LoopComplete {
        reason: LoopCompleteReason,
        iteration: u32,
        todos: Vec<Todo>,
        progress: TodoProgress,
    },
}

impl ProgressEvent {
    /// The `type` tag, also passed as the callback's first argument.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ContentStreamed { .. } => "content_streamed",
            Self::Reasoning { .. } => "reasoning",
            Self::ToolCall { .. } => "tool-call",
            Self::ToolResult { .. } => "tool-result",
            Self::ToolSkipped { .. } => "tool-skipped",
            Self::CommandStatus { .. } => "command-status",
            Self::PlanContentStreaming { .. } => "plan-content-streaming",
            Self::FileCreated { .. } => "file-created",
            Self::NativePlanModeEntered { .. } => "native-plan-mode-entered",
            Self::NativePlanModeExiting { .. } => "native-plan-mode-exiting",
            Self::Error { .. } => "error",
            Self::DiagnosticProblems { .. } => "diagnostic-problems",
            Self::MistakeLimit { .. } => "mistake-limit",
            Self::TodosUpdated { .. } => "todos-updated",
            Self::LoopIterationStart { .. } => "loop-iteration-start",
            Self::LoopIterationComplete { .. } => "loop-iteration-complete",
            Self::LoopComplete { .. } => "loop-complete",
        }
    }
}

/// UI callback: `(event type, serialized event)`.
pub type ProgressCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Serializes events and hands them to an optional callback.
#[derive(Clone, Default)]
pub struct ProgressEmitter {
    callback: Option<ProgressCallback>,
}

impl ProgressEmitter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// An emitter that drops every event.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ProgressEvent) {
        let Some(callback) = &self.callback else {
            return;
        };
        match serde_json::to_string(&event) {
            Ok(json) => callback(event.event_type(), &json),
            Err(e) => warn!(event = event.event_type(), "Failed to serialize progress event: {e}"),
        }
    }
}

impl std::fmt::Debug for ProgressEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressEmitter")
            .field("attached", &self.callback.is_some())
            .finish()
    }
}
