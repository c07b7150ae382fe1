//! Per-run agent state.

use serde::{Deserialize, Serialize};
use crate::message::Message;
use crate::todo::Todo;

/// A file produced by a successful file-writing tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub test_id: String,
    pub file_path: String,
}

/// Runtime state of one execution loop pass.
///
/// Only the event dispatcher mutates this, one event at a time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    /// Append-only conversation log
    pub messages: Vec<Message>,

    /// Files written by successful file-writing tools, in order
    pub executions: Vec<ExecutionRecord>,

    /// Sticky once set: every later tool call is skipped
    pub did_reject_tool: bool,

    /// Set when the completion tool reports `completed: true`
    pub task_completed: bool,

    /// Failures, diagnostic regressions and rejections since the last explicit success
    pub consecutive_mistakes: u32,

    /// Latest todo snapshot reported by the agent, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todos: Option<Vec<Todo>>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn record_execution(&mut self, test_id: impl Into<String>, file_path: impl Into<String>) {
        self.executions.push(ExecutionRecord {
            test_id: test_id.into(),
            file_path: file_path.into(),
        });
    }

    pub fn mark_rejected(&mut self) {
        self.did_reject_tool = true;
    }

    pub fn mark_task_completed(&mut self) {
        self.task_completed = true;
    }

    /// Increment the mistake counter and return the new count.
    pub fn record_mistake(&mut self) -> u32 {
        self.consecutive_mistakes += 1;
        self.consecutive_mistakes
    }

    pub fn reset_mistakes(&mut self) {
        self.consecutive_mistakes = 0;
    }
}
