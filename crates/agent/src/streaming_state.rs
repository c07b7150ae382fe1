//! Correlation of in-flight tool calls with their streamed arguments and files.

use std::collections::{HashMap, HashSet};

/// Whether a plan call's placeholder file was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanInitStatus {
    Pending,
    Ready,
    Failed,
}

/// Per-run lookup tables keyed by tool call id or by semantic key.
///
/// Keys are unique and updates are last-write-wins.
#[derive(Debug, Default)]
pub struct StreamingState {
    command_to_call_id: HashMap<String, String>,
    file_to_call_id: HashMap<String, String>,
    /// call id → file most recently tracked for it
    call_to_file: HashMap<String, String>,
    /// plan call id → plan file path currently in use
    plan_paths: HashMap<String, String>,
    /// call id → raw argument text received so far
    streaming_args_text: HashMap<String, String>,
    plan_init_status: HashMap<String, PlanInitStatus>,
    /// (call id, target path) pairs whose streaming write was initialized
    initialized_writes: HashSet<(String, String)>,
    /// plan call ids whose plan already reached the UI as complete
    completed_plans: HashSet<String>,
    /// plan call ids whose suites summary has been seen
    suites_seen: HashSet<String>,
    last_plan_path: Option<String>,
}

impl StreamingState {
    pub fn new() -> Self {
        Self::default()
    }

    // --- streamed arguments ---

    pub fn begin_args(&mut self, call_id: &str) {
        self.streaming_args_text.insert(call_id.to_string(), String::new());
    }

    /// Append a delta and return the accumulated text.
    pub fn append_args(&mut self, call_id: &str, delta: &str) -> &str {
        let text = self.streaming_args_text.entry(call_id.to_string()).or_default();
        text.push_str(delta);
        text
    }

    pub fn has_args(&self, call_id: &str) -> bool {
        self.streaming_args_text.contains_key(call_id)
    }

    pub fn take_args(&mut self, call_id: &str) -> Option<String> {
        self.streaming_args_text.remove(call_id)
    }

    // --- semantic key → call id ---

    pub fn track_command(&mut self, command: &str, call_id: &str) {
        self.command_to_call_id.insert(command.to_string(), call_id.to_string());
    }

    pub fn call_for_command(&self, command: &str) -> Option<&str> {
        self.command_to_call_id.get(command).map(String::as_str)
    }

    pub fn track_file(&mut self, path: &str, call_id: &str) {
        self.file_to_call_id.insert(path.to_string(), call_id.to_string());
        self.call_to_file.insert(call_id.to_string(), path.to_string());
    }

    pub fn untrack_file(&mut self, path: &str) {
        if let Some(call_id) = self.file_to_call_id.remove(path) {
            if self.call_to_file.get(&call_id).is_some_and(|p| p == path) {
                self.call_to_file.remove(&call_id);
            }
        }
    }

    pub fn call_for_file(&self, path: &str) -> Option<&str> {
        self.file_to_call_id.get(path).map(String::as_str)
    }

    /// Reverse lookup: the most recent file tracked for `call_id`.
    pub fn file_for_call(&self, call_id: &str) -> Option<&str> {
        self.call_to_file.get(call_id).map(String::as_str)
    }

    // --- file-write initialization ---

    pub fn is_write_initialized(&self, call_id: &str, path: &str) -> bool {
        self.initialized_writes
            .contains(&(call_id.to_string(), path.to_string()))
    }

    pub fn mark_write_initialized(&mut self, call_id: &str, path: &str) {
        self.initialized_writes
            .insert((call_id.to_string(), path.to_string()));
    }

    // --- plan files ---

    pub fn set_plan_path(&mut self, call_id: &str, path: &str) {
        self.plan_paths.insert(call_id.to_string(), path.to_string());
        self.last_plan_path = Some(path.to_string());
    }

    pub fn plan_path(&self, call_id: &str) -> Option<&str> {
        self.plan_paths.get(call_id).map(String::as_str)
    }

    pub fn remove_plan_path(&mut self, call_id: &str) -> Option<String> {
        self.plan_init_status.remove(call_id);
        self.suites_seen.remove(call_id);
        self.plan_paths.remove(call_id)
    }

    /// The plan path most recently assigned to any call, kept after cleanup.
    pub fn last_plan_path(&self) -> Option<&str> {
        self.last_plan_path.as_deref()
    }

    pub fn set_plan_init(&mut self, call_id: &str, status: PlanInitStatus) {
        self.plan_init_status.insert(call_id.to_string(), status);
    }

    pub fn plan_init(&self, call_id: &str) -> Option<PlanInitStatus> {
        self.plan_init_status.get(call_id).copied()
    }

    /// Record that the suites summary is available; true the first time.
    pub fn note_suites_seen(&mut self, call_id: &str) -> bool {
        self.suites_seen.insert(call_id.to_string())
    }

    pub fn mark_plan_completed(&mut self, call_id: &str) {
        self.completed_plans.insert(call_id.to_string());
    }

    pub fn take_plan_completed(&mut self, call_id: &str) -> bool {
        self.completed_plans.remove(call_id)
    }
}
