//! The event dispatcher: one agent stream event in, state transitions,
//! collaborator calls and progress events out.
//!
//! The dispatcher owns no run state. The execution loop hands it the
//! [`AgentState`] and [`StreamingState`] for the current event only, so
//! deltas are always applied strictly in arrival order.
//!
//! Side-effect failures are logged and swallowed here. Progress events are
//! emitted before the file write they describe is attempted, so the UI never
//! waits on file I/O.

use crate::collaborators::Collaborators;
use crate::partial_json::{ArraySummary, extract_array_summary, extract_complete_field, extract_field};
use crate::progress::{
    CommandStatus, ProgressEmitter, ProgressEvent, ToolCallState, ToolResultState,
};
use crate::streaming_state::{PlanInitStatus, StreamingState};
use crate::text::{
    descriptive_plan_path, is_descriptive_plan_path, placeholder_plan_path, sanitize_plan_name,
    unescape_json_string,
};
use clive_core::{
    AgentState, AgentStreamEvent, Message, Todo, TodoProgress, ToolCall, ToolKind, ToolName,
};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

pub const DEFAULT_PLANS_DIR: &str = ".clive/plans";
pub const DEFAULT_MISTAKE_LIMIT: u32 = 5;

pub const REJECTED_SKIP_REASON: &str = "previous tool was rejected";
pub const MISTAKE_LIMIT_MESSAGE: &str =
    "Too many consecutive mistakes. Consider adjusting your approach or asking for help.";

/// Marker a file-writing tool puts in its message when its edit introduced
/// new diagnostics.
const NEW_PROBLEMS_MARKER: &str = "New diagnostic problems introduced";

const READ_COMMANDS: &[&str] = &["cat", "head", "tail", "less", "more", "bat"];
const SCAN_COMMANDS: &[&str] = &["ls", "find", "tree", "grep", "rg", "fd"];
const TEST_RUNNERS: &[&str] = &[
    "vitest",
    "jest",
    "mocha",
    "playwright",
    "cypress",
    "pytest",
    "npm test",
    "npm run test",
    "yarn test",
    "pnpm test",
    "bun test",
    "cargo test",
    "go test",
];

/// What the execution loop must do after an event was dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Nothing further; read the next event.
    Continue,
    /// A local tool call: execute it and send the result back.
    Execute(ToolCall),
    /// A local tool call suppressed by the rejection cascade. The process is
    /// still waiting for an answer.
    Skipped(ToolCall),
    /// End of stream.
    Done,
}

pub struct EventDispatcher {
    collaborators: Collaborators,
    emitter: ProgressEmitter,
    plans_dir: String,
    mistake_limit: u32,
}

impl EventDispatcher {
    pub fn new(collaborators: Collaborators, emitter: ProgressEmitter) -> Self {
        Self {
            collaborators,
            emitter,
            plans_dir: DEFAULT_PLANS_DIR.into(),
            mistake_limit: DEFAULT_MISTAKE_LIMIT,
        }
    }

    /// Directory plan files are created in, relative to the workspace root.
    pub fn with_plans_dir(mut self, dir: impl Into<String>) -> Self {
        self.plans_dir = dir.into();
        self
    }

    pub fn with_mistake_limit(mut self, limit: u32) -> Self {
        self.mistake_limit = limit;
        self
    }

    pub fn emitter(&self) -> &ProgressEmitter {
        &self.emitter
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Handle one event from the agent stream.
    pub async fn dispatch(
        &self,
        event: AgentStreamEvent,
        agent: &mut AgentState,
        streaming: &mut StreamingState,
    ) -> Dispatch {
        trace!(kind = event.kind(), "Dispatching stream event");
        match event {
            AgentStreamEvent::TextDelta { content } => {
                if !content.is_empty() {
                    self.emitter.emit(ProgressEvent::ContentStreamed { content });
                }
                Dispatch::Continue
            }
            AgentStreamEvent::ThinkingDelta { content } => {
                if !content.is_empty() {
                    self.emitter.emit(ProgressEvent::Reasoning { content });
                }
                Dispatch::Continue
            }
            AgentStreamEvent::ToolCallStreamingStart {
                tool_call_id,
                tool_name,
            } => {
                self.on_streaming_start(&tool_call_id, &tool_name, agent, streaming);
                Dispatch::Continue
            }
            AgentStreamEvent::ToolCallDelta {
                tool_call_id,
                tool_name,
                delta,
            } => {
                if agent.did_reject_tool {
                    return Dispatch::Continue;
                }
                match ToolName::parse(&tool_name).kind() {
                    ToolKind::FileWrite => {
                        self.on_file_write_delta(&tool_call_id, &delta, streaming).await
                    }
                    ToolKind::PlanProposal => {
                        self.on_plan_delta(&tool_call_id, &delta, streaming).await
                    }
                    _ => {}
                }
                Dispatch::Continue
            }
            AgentStreamEvent::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => {
                self.on_tool_call(
                    ToolCall {
                        id: tool_call_id,
                        name: tool_name,
                        arguments: args,
                    },
                    agent,
                    streaming,
                )
                .await
            }
            AgentStreamEvent::ToolResult {
                tool_call_id,
                tool_name,
                output,
                is_error,
            } => {
                self.on_tool_result(&tool_call_id, &tool_name, output, is_error, agent, streaming)
                    .await;
                Dispatch::Continue
            }
            AgentStreamEvent::Error { message } => {
                self.emitter.emit(ProgressEvent::Error { message });
                Dispatch::Continue
            }
            AgentStreamEvent::Done => Dispatch::Done,
        }
    }

    fn on_streaming_start(
        &self,
        id: &str,
        raw_name: &str,
        agent: &AgentState,
        streaming: &mut StreamingState,
    ) {
        if agent.did_reject_tool {
            return;
        }
        let name = ToolName::parse(raw_name);
        let kind = name.kind();
        if !kind.is_streaming() {
            return;
        }
        streaming.begin_args(id);
        if kind == ToolKind::PlanProposal {
            self.emitter.emit(ProgressEvent::ToolCall {
                tool_call_id: id.to_string(),
                tool_name: name.display,
                args: None,
                state: ToolCallState::InputStreaming,
                is_mcp_tool: Some(name.is_mcp),
            });
        }
    }

    // ── Streaming deltas ──

    async fn on_file_write_delta(&self, id: &str, delta: &str, streaming: &mut StreamingState) {
        let accumulated = streaming.append_args(id, delta).to_string();

        let Some(raw_content) = extract_field(&accumulated, "testContent") else {
            return;
        };
        let Some(target) = extract_complete_field(&accumulated, "targetPath") else {
            debug!(tool_call_id = %id, "Test content streaming before targetPath, waiting");
            return;
        };
        let target = unescape_json_string(target);

        if !streaming.is_write_initialized(id, &target) {
            let writer = &self.collaborators.test_files;
            if let Err(e) = writer.init_streaming_write(id, &target).await {
                warn!(tool_call_id = %id, path = %target, "Failed to initialize streaming write: {e}");
                return;
            }
            streaming.mark_write_initialized(id, &target);
            streaming.track_file(&target, id);
        }

        let content = unescape_json_string(raw_content);
        if let Err(e) = self
            .collaborators
            .test_files
            .append_streaming_content(id, &content)
            .await
        {
            warn!(tool_call_id = %id, path = %target, "Failed to append streamed test content: {e}");
        }
    }

    async fn on_plan_delta(&self, id: &str, delta: &str, streaming: &mut StreamingState) {
        let accumulated = streaming.append_args(id, delta).to_string();

        // Wait for the closing quote so a partial name never becomes a file name.
        let slug = extract_complete_field(&accumulated, "name")
            .map(|name| sanitize_plan_name(&unescape_json_string(name)));
        let suites = extract_array_summary(&accumulated, "suites");
        let suites_new = suites.is_some() && streaming.note_suites_seen(id);

        if let Some(slug) = &slug {
            if streaming.plan_path(id).is_none() {
                self.create_plan_placeholder(id, slug, streaming).await;
                if let Some(summary) = &suites {
                    self.upgrade_plan_path(id, slug, summary, streaming).await;
                }
            } else if suites_new {
                if let Some(summary) = &suites {
                    self.upgrade_plan_path(id, slug, summary, streaming).await;
                }
            }
        }

        let Some(raw_content) = extract_field(&accumulated, "planContent") else {
            return;
        };
        let content = unescape_json_string(raw_content);
        let path = streaming.plan_path(id).map(str::to_string);

        self.emitter.emit(ProgressEvent::PlanContentStreaming {
            tool_call_id: id.to_string(),
            content: content.clone(),
            is_complete: false,
            file_path: path.clone(),
        });

        if let Some(path) = path {
            if streaming.plan_init(id) == Some(PlanInitStatus::Ready) {
                if let Err(e) = self
                    .collaborators
                    .plan_files
                    .append_plan_content(&path, &content)
                    .await
                {
                    warn!(tool_call_id = %id, path = %path, "Failed to append plan content: {e}");
                }
            }
        }
    }

    async fn create_plan_placeholder(&self, id: &str, slug: &str, streaming: &mut StreamingState) {
        let path = placeholder_plan_path(&self.plans_dir, slug);
        // Tracked before creation so later deltas can report it either way.
        streaming.set_plan_path(id, &path);
        streaming.set_plan_init(id, PlanInitStatus::Pending);

        match self.collaborators.plan_files.init_plan_file(&path).await {
            Ok(()) => {
                info!(tool_call_id = %id, path = %path, "Created plan file");
                streaming.set_plan_init(id, PlanInitStatus::Ready);
                streaming.track_file(&path, id);
                self.emitter.emit(ProgressEvent::FileCreated {
                    tool_call_id: id.to_string(),
                    file_path: path,
                });
            }
            Err(e) => {
                warn!(tool_call_id = %id, path = %path, "Failed to create plan file: {e}");
                streaming.set_plan_init(id, PlanInitStatus::Failed);
                self.emitter.emit(ProgressEvent::Error {
                    message: format!("Failed to create plan file {path}: {e}"),
                });
            }
        }
    }

    /// Rename the placeholder to its descriptive name. Best-effort.
    async fn upgrade_plan_path(
        &self,
        id: &str,
        slug: &str,
        summary: &ArraySummary,
        streaming: &mut StreamingState,
    ) {
        if streaming.plan_init(id) != Some(PlanInitStatus::Ready) {
            return;
        }
        let Some(current) = streaming.plan_path(id).map(str::to_string) else {
            return;
        };
        if is_descriptive_plan_path(&current) {
            return;
        }

        let target = descriptive_plan_path(&self.plans_dir, slug, summary);
        match self
            .collaborators
            .plan_files
            .rename_plan_file(&current, &target)
            .await
        {
            Ok(()) => {
                debug!(tool_call_id = %id, from = %current, to = %target, "Renamed plan file");
                streaming.untrack_file(&current);
                streaming.set_plan_path(id, &target);
                streaming.track_file(&target, id);
                self.emitter.emit(ProgressEvent::FileCreated {
                    tool_call_id: id.to_string(),
                    file_path: target,
                });
            }
            Err(e) => {
                warn!(tool_call_id = %id, from = %current, to = %target, "Plan rename failed: {e}");
            }
        }
    }

    // ── Complete tool calls ──

    async fn on_tool_call(
        &self,
        call: ToolCall,
        agent: &mut AgentState,
        streaming: &mut StreamingState,
    ) -> Dispatch {
        let name = ToolName::parse(&call.name);

        if agent.did_reject_tool {
            info!(tool_call_id = %call.id, tool = %name.display, "Skipping tool after rejection");
            streaming.take_args(&call.id);
            self.emitter.emit(ProgressEvent::ToolSkipped {
                tool_call_id: call.id.clone(),
                tool_name: Some(name.display.clone()),
                reason: REJECTED_SKIP_REASON.into(),
            });
            return if name.is_local() {
                Dispatch::Skipped(call)
            } else {
                Dispatch::Continue
            };
        }

        let id = call.id.as_str();
        let args = &call.arguments;
        match name.kind() {
            ToolKind::Command => {
                if let Some(command) = args.get("command").and_then(Value::as_str) {
                    streaming.track_command(command, id);
                    self.emitter.emit(ProgressEvent::CommandStatus {
                        tool_call_id: id.to_string(),
                        command: command.to_string(),
                        status: classify_command(command),
                    });
                }
            }
            ToolKind::FileWrite => {
                if let Some(path) = args.get("targetPath").and_then(Value::as_str) {
                    streaming.track_file(path, id);
                }
                if streaming.take_args(id).is_some() {
                    if let Err(e) = self
                        .collaborators
                        .test_files
                        .finalize_streaming_write(id)
                        .await
                    {
                        debug!(tool_call_id = %id, "No streaming write to finalize: {e}");
                    }
                }
            }
            ToolKind::TodoWrite => {
                if let Some(todos) = Todo::list_from_args(args) {
                    let progress = TodoProgress::of(&todos);
                    agent.todos = Some(todos.clone());
                    self.emitter
                        .emit(ProgressEvent::TodosUpdated { todos, progress });
                }
            }
            ToolKind::EnterPlanMode => {
                self.emitter.emit(ProgressEvent::NativePlanModeEntered {
                    tool_call_id: id.to_string(),
                });
            }
            ToolKind::ExitPlanMode => {
                self.emitter.emit(ProgressEvent::NativePlanModeExiting {
                    tool_call_id: id.to_string(),
                    plan_file_path: streaming.last_plan_path().map(str::to_string),
                });
            }
            _ => {}
        }

        self.emitter.emit(ProgressEvent::ToolCall {
            tool_call_id: call.id.clone(),
            tool_name: name.display.clone(),
            args: Some(call.arguments.clone()),
            state: ToolCallState::InputAvailable,
            is_mcp_tool: Some(name.is_mcp),
        });

        if name.kind() == ToolKind::PlanProposal && name.is_mcp {
            self.complete_plan_from_args(&call, streaming).await;
        }

        if name.is_local() {
            Dispatch::Execute(call)
        } else {
            Dispatch::Continue
        }
    }

    /// MCP plan calls may never produce a result the core sees, so the
    /// terminal plan event is emitted from the final arguments.
    async fn complete_plan_from_args(&self, call: &ToolCall, streaming: &mut StreamingState) {
        let Some(content) = call.arguments.get("planContent").and_then(Value::as_str) else {
            return;
        };
        let id = call.id.as_str();
        let path = streaming.plan_path(id).map(str::to_string);

        if let Some(path) = &path {
            if streaming.plan_init(id) == Some(PlanInitStatus::Ready) {
                let plans = &self.collaborators.plan_files;
                if let Err(e) = plans.append_plan_content(path, content).await {
                    warn!(tool_call_id = %id, path = %path, "Failed to write final plan content: {e}");
                }
                if let Err(e) = plans.finalize_plan_file(path).await {
                    warn!(tool_call_id = %id, path = %path, "Failed to finalize plan file: {e}");
                }
            }
            streaming.remove_plan_path(id);
        }
        streaming.take_args(id);

        self.emitter.emit(ProgressEvent::PlanContentStreaming {
            tool_call_id: id.to_string(),
            content: content.to_string(),
            is_complete: true,
            file_path: path,
        });
        streaming.mark_plan_completed(id);
    }

    // ── Tool results ──

    async fn on_tool_result(
        &self,
        id: &str,
        raw_name: &str,
        output: Value,
        is_error: bool,
        agent: &mut AgentState,
        streaming: &mut StreamingState,
    ) {
        let name = ToolName::parse(raw_name);
        let kind = name.kind();
        let payload = unwrap_output(output);

        let rejected = flag(&payload, "rejected");
        let cancelled = flag(&payload, "cancelled");
        if rejected {
            info!(tool_call_id = %id, tool = %name.display, "Tool rejected, skipping remaining tools");
            agent.mark_rejected();
        }

        if kind == ToolKind::CompleteTask && flag(&payload, "completed") {
            info!(tool_call_id = %id, "Task marked complete");
            agent.mark_task_completed();
        }

        if kind == ToolKind::PlanProposal {
            self.finalize_plan(id, &payload, streaming).await;
        }

        self.track_mistakes(id, &name, &payload, rejected, agent);

        let state = if cancelled {
            ToolResultState::OutputCancelled
        } else if rejected {
            ToolResultState::OutputDenied
        } else if is_error || is_error_payload(&payload) {
            ToolResultState::OutputError
        } else {
            ToolResultState::OutputAvailable
        };

        if kind == ToolKind::FileWrite && state == ToolResultState::OutputAvailable {
            let path = payload
                .get("filePath")
                .and_then(Value::as_str)
                .or_else(|| streaming.file_for_call(id));
            match path {
                Some(path) => agent.record_execution(id, path),
                None => debug!(tool_call_id = %id, "Successful file write without a known path"),
            }
        }

        agent.push_message(Message::tool_result(id, payload.to_string()));
        self.emitter.emit(ProgressEvent::ToolResult {
            tool_call_id: id.to_string(),
            tool_name: name.display,
            output: payload,
            state,
        });
    }

    async fn finalize_plan(&self, id: &str, payload: &Value, streaming: &mut StreamingState) {
        let accumulated = streaming.take_args(id);
        let tracked = streaming.plan_path(id).map(str::to_string);
        let resolved = payload
            .get("filePath")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .or_else(|| tracked.clone());

        if let Some(path) = &tracked {
            if streaming.plan_init(id) == Some(PlanInitStatus::Ready) {
                if let Err(e) = self.collaborators.plan_files.finalize_plan_file(path).await {
                    warn!(tool_call_id = %id, path = %path, "Failed to finalize plan file: {e}");
                }
            }
            streaming.remove_plan_path(id);
        }

        if streaming.take_plan_completed(id) {
            return;
        }

        let terminal = match &accumulated {
            Some(text) => extract_field(text, "planContent").map(unescape_json_string),
            None if resolved.is_some() => Some(String::new()),
            None => None,
        };
        if let Some(content) = terminal {
            self.emitter.emit(ProgressEvent::PlanContentStreaming {
                tool_call_id: id.to_string(),
                content,
                is_complete: true,
                file_path: resolved,
            });
        }
    }

    fn track_mistakes(
        &self,
        id: &str,
        name: &ToolName,
        payload: &Value,
        rejected: bool,
        agent: &mut AgentState,
    ) {
        let failed = payload.get("success") == Some(&Value::Bool(false));
        let new_problems = payload
            .get("message")
            .and_then(Value::as_str)
            .is_some_and(|m| m.contains(NEW_PROBLEMS_MARKER));

        if failed || new_problems || rejected {
            let count = agent.record_mistake();
            debug!(tool_call_id = %id, count, "Consecutive mistake recorded");
            if new_problems {
                self.emitter.emit(ProgressEvent::DiagnosticProblems {
                    tool_call_id: Some(id.to_string()),
                    tool_name: Some(name.display.clone()),
                });
            }
            if count >= self.mistake_limit {
                warn!(count, "Consecutive mistake limit reached");
                self.emitter.emit(ProgressEvent::MistakeLimit {
                    count,
                    message: MISTAKE_LIMIT_MESSAGE.into(),
                });
            }
        } else if payload.get("success") == Some(&Value::Bool(true)) {
            agent.reset_mistakes();
        }
    }
}

/// Unwrap `{ "output": {...} }` envelopes and parse JSON-encoded strings.
fn unwrap_output(output: Value) -> Value {
    let output = match output {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed @ Value::Object(_)) => parsed,
            _ => Value::String(s),
        },
        other => other,
    };
    match output {
        Value::Object(mut map) if matches!(map.get("output"), Some(Value::Object(_))) => {
            map.remove("output").unwrap_or_default()
        }
        other => other,
    }
}

fn flag(payload: &Value, key: &str) -> bool {
    payload.get(key) == Some(&Value::Bool(true))
}

/// A truthy `error` or `success: false`. `null`, `false`, `0` and `""` are
/// not errors; objects and arrays always are.
fn is_error_payload(payload: &Value) -> bool {
    let has_error = match payload.get("error") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    };
    has_error || payload.get("success") == Some(&Value::Bool(false))
}

/// Coarse status shown while a shell command runs.
pub fn classify_command(command: &str) -> CommandStatus {
    let lowered = command.to_lowercase();
    if TEST_RUNNERS.iter().any(|runner| lowered.contains(runner)) {
        return CommandStatus::Running;
    }
    let program = lowered
        .split_whitespace()
        .next()
        .map(|p| p.rsplit('/').next().unwrap_or(p))
        .unwrap_or_default();
    if READ_COMMANDS.contains(&program) {
        CommandStatus::Reading
    } else if SCAN_COMMANDS.contains(&program) {
        CommandStatus::Scanning
    } else {
        CommandStatus::Executing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;
    use std::sync::Arc;

    struct Harness {
        dispatcher: EventDispatcher,
        writers: Arc<RecordingWriters>,
        events: Captured,
        agent: AgentState,
        streaming: StreamingState,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_writers(RecordingWriters::default())
        }

        fn with_writers(writers: RecordingWriters) -> Self {
            let writers = Arc::new(writers);
            let (emitter, events) = capture();
            Self {
                dispatcher: EventDispatcher::new(collaborators(&writers), emitter),
                writers,
                events,
                agent: AgentState::new(),
                streaming: StreamingState::new(),
            }
        }

        async fn feed(&mut self, event: AgentStreamEvent) -> Dispatch {
            self.dispatcher
                .dispatch(event, &mut self.agent, &mut self.streaming)
                .await
        }

        async fn feed_all(&mut self, events: Vec<AgentStreamEvent>) {
            for event in events {
                self.feed(event).await;
            }
        }
    }

    #[tokio::test]
    async fn text_and_thinking_deltas() {
        let mut h = Harness::new();
        h.feed_all(vec![
            text("Hello"),
            text(""),
            AgentStreamEvent::ThinkingDelta {
                content: "hmm".into(),
            },
        ])
        .await;
        assert_eq!(h.events.types(), vec!["content_streamed", "reasoning"]);
        assert_eq!(h.events.of_type("reasoning")[0]["content"], "hmm");
    }

    #[tokio::test]
    async fn plan_start_emits_streaming_card() {
        let mut h = Harness::new();
        h.feed(start("p1", "mcp__clive__proposeTestPlan")).await;
        h.feed(start("b1", "Bash")).await;

        let calls = h.events.of_type("tool-call");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["state"], "input-streaming");
        assert_eq!(calls[0]["toolName"], "proposeTestPlan");
        assert!(calls[0].get("args").is_none());
        assert!(h.streaming.has_args("p1"));
        assert!(!h.streaming.has_args("b1"));
    }

    #[tokio::test]
    async fn file_write_streams_content_after_target_path() {
        let mut h = Harness::new();
        h.feed_all(vec![
            start("t1", "writeTestFile"),
            delta("t1", "writeTestFile", r#"{"testContent": "it('a'"#),
            delta("t1", "writeTestFile", r#", 1)\n", "targetPath": "src/a.test.ts"}"#),
        ])
        .await;

        // targetPath arrives after testContent, so nothing is written until
        // the second delta.
        assert_eq!(
            h.writers.calls(),
            vec![
                "init:t1:src/a.test.ts".to_string(),
                "append:t1:it('a', 1)\n".to_string(),
            ]
        );
        assert_eq!(h.streaming.call_for_file("src/a.test.ts"), Some("t1"));
    }

    #[tokio::test]
    async fn file_write_initializes_once_and_keeps_appending() {
        let mut h = Harness::new();
        h.feed_all(vec![
            start("t1", "writeTestFile"),
            delta("t1", "writeTestFile", r#"{"targetPath": "a.test.ts", "testContent": "x"#),
            delta("t1", "writeTestFile", "y"),
            delta("t1", "writeTestFile", r#"z"}"#),
            call("t1", "writeTestFile", json!({"targetPath": "a.test.ts", "testContent": "xyz"})),
        ])
        .await;

        assert_eq!(
            h.writers.calls(),
            vec![
                "init:t1:a.test.ts",
                "append:t1:x",
                "append:t1:xy",
                "append:t1:xyz",
                "finalize:t1",
            ]
        );
        assert!(!h.streaming.has_args("t1"));
    }

    #[tokio::test]
    async fn failed_init_skips_append_and_retries() {
        let mut h = Harness::with_writers(RecordingWriters {
            fail_test_init: true,
            ..Default::default()
        });
        h.feed_all(vec![
            start("t1", "writeTestFile"),
            delta("t1", "writeTestFile", r#"{"targetPath": "a.test.ts", "testContent": "x"#),
            delta("t1", "writeTestFile", "y"),
        ])
        .await;
        assert_eq!(h.writers.calls(), vec!["init:t1:a.test.ts", "init:t1:a.test.ts"]);
        assert!(h.events.of_type("error").is_empty());
    }

    #[tokio::test]
    async fn plan_filename_upgrade() {
        let mut h = Harness::new();
        let name = "mcp__clive__proposeTestPlan";
        h.feed_all(vec![
            start("p1", name),
            delta("p1", name, r#"{"name": "Auth Service", "#),
            delta("p1", name, r#""suites": [{"name": "login", "testType": "unit"}], "#),
            delta("p1", name, r##""planContent": "# Plan\n"##),
            delta("p1", name, r#"more"#),
        ])
        .await;

        let created = h.events.of_type("file-created");
        assert_eq!(created.len(), 2);
        assert_eq!(created[0]["filePath"], ".clive/plans/auth-service.md");
        assert_eq!(created[1]["filePath"], ".clive/plans/auth-service-unit-1-suite.md");

        let streamed = h.events.of_type("plan-content-streaming");
        assert_eq!(streamed.len(), 2);
        for event in &streamed {
            assert_eq!(event["filePath"], ".clive/plans/auth-service-unit-1-suite.md");
            assert_eq!(event["isComplete"], false);
        }
        assert_eq!(streamed[1]["content"], "# Plan\nmore");

        let calls = h.writers.calls();
        assert_eq!(calls[0], "plan-init:.clive/plans/auth-service.md");
        assert_eq!(
            calls[1],
            "plan-rename:.clive/plans/auth-service.md->.clive/plans/auth-service-unit-1-suite.md"
        );
        assert_eq!(
            calls.last().unwrap(),
            "plan-append:.clive/plans/auth-service-unit-1-suite.md:# Plan\nmore"
        );
    }

    #[tokio::test]
    async fn plan_with_suites_in_first_delta_renames_immediately() {
        let mut h = Harness::new();
        h.feed_all(vec![
            start("p1", "proposeTestPlan"),
            delta(
                "p1",
                "proposeTestPlan",
                r#"{"name": "API", "suites": [{"testType": "unit"}, {"testType": "e2e"}]"#,
            ),
            delta("p1", "proposeTestPlan", r#", "planContent": "x""#),
        ])
        .await;

        let created = h.events.of_type("file-created");
        assert_eq!(created.len(), 2);
        assert_eq!(created[1]["filePath"], ".clive/plans/api-mixed-2-suites.md");
        let renames = h
            .writers
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("plan-rename"))
            .count();
        assert_eq!(renames, 1);
    }

    #[tokio::test]
    async fn plan_init_failure_emits_error_but_keeps_streaming() {
        let mut h = Harness::with_writers(RecordingWriters {
            fail_plan_init: true,
            ..Default::default()
        });
        h.feed_all(vec![
            start("p1", "proposeTestPlan"),
            delta("p1", "proposeTestPlan", r#"{"name": "x", "planContent": "abc"#),
        ])
        .await;

        assert_eq!(h.events.of_type("error").len(), 1);
        assert!(h.events.of_type("file-created").is_empty());
        let streamed = h.events.of_type("plan-content-streaming");
        assert_eq!(streamed.len(), 1);
        assert_eq!(streamed[0]["filePath"], ".clive/plans/x.md");
        assert!(!h.writers.calls().iter().any(|c| c.starts_with("plan-append")));
    }

    #[tokio::test]
    async fn plan_rename_failure_is_log_only() {
        let mut h = Harness::with_writers(RecordingWriters {
            fail_rename: true,
            ..Default::default()
        });
        h.feed_all(vec![
            start("p1", "proposeTestPlan"),
            delta("p1", "proposeTestPlan", r#"{"name": "x", "suites": [{"testType": "unit"}]"#),
        ])
        .await;
        assert!(h.events.of_type("error").is_empty());
        assert_eq!(h.events.of_type("file-created").len(), 1);
        assert_eq!(h.streaming.plan_path("p1"), Some(".clive/plans/x.md"));
    }

    #[tokio::test]
    async fn plan_result_finalizes_and_emits_terminal_content() {
        let mut h = Harness::new();
        h.feed_all(vec![
            start("p1", "proposeTestPlan"),
            delta("p1", "proposeTestPlan", r#"{"name": "x", "planContent": "line\tone"}"#),
            call("p1", "proposeTestPlan", json!({"name": "x", "planContent": "line\tone"})),
            result("p1", "proposeTestPlan", json!({"success": true})),
        ])
        .await;

        assert!(h.writers.calls().contains(&"plan-finalize:.clive/plans/x.md".to_string()));
        let terminal: Vec<_> = h
            .events
            .of_type("plan-content-streaming")
            .into_iter()
            .filter(|e| e["isComplete"] == true)
            .collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0]["content"], "line\tone");
        assert_eq!(terminal[0]["filePath"], ".clive/plans/x.md");
        assert_eq!(h.streaming.plan_path("p1"), None);
        assert!(!h.streaming.has_args("p1"));
    }

    #[tokio::test]
    async fn plan_result_without_streaming_still_links_file() {
        let mut h = Harness::new();
        h.feed(result(
            "p1",
            "proposeTestPlan",
            json!({"success": true, "filePath": ".clive/plans/given.md"}),
        ))
        .await;
        let terminal = h.events.of_type("plan-content-streaming");
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0]["content"], "");
        assert_eq!(terminal[0]["isComplete"], true);
        assert_eq!(terminal[0]["filePath"], ".clive/plans/given.md");
    }

    #[tokio::test]
    async fn mcp_plan_call_completes_without_result() {
        let mut h = Harness::new();
        let dispatch = h
            .feed(call(
                "p1",
                "mcp__srv__proposeTestPlan",
                json!({"name": "Auth", "planContent": "# Auth plan"}),
            ))
            .await;
        h.feed(AgentStreamEvent::Done).await;

        assert_eq!(dispatch, Dispatch::Continue);
        let calls = h.events.of_type("tool-call");
        assert_eq!(calls[0]["isMcpTool"], true);
        assert_eq!(calls[0]["toolName"], "proposeTestPlan");
        let terminal = h.events.of_type("plan-content-streaming");
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0]["isComplete"], true);
        assert_eq!(terminal[0]["content"], "# Auth plan");
    }

    #[tokio::test]
    async fn mcp_plan_result_does_not_duplicate_terminal_event() {
        let mut h = Harness::new();
        let name = "mcp__srv__proposeTestPlan";
        h.feed_all(vec![
            start("p1", name),
            delta("p1", name, r#"{"name": "a", "planContent": "c"}"#),
            call("p1", name, json!({"name": "a", "planContent": "c"})),
            result("p1", name, json!({"success": true})),
        ])
        .await;
        let terminal: Vec<_> = h
            .events
            .of_type("plan-content-streaming")
            .into_iter()
            .filter(|e| e["isComplete"] == true)
            .collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0]["filePath"], ".clive/plans/a.md");
        let finalizes = h
            .writers
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("plan-finalize"))
            .count();
        assert_eq!(finalizes, 1);
    }

    #[tokio::test]
    async fn empty_error_string_is_not_an_error() {
        let mut h = Harness::new();
        h.feed(result("r1", "Read", json!({"error": ""}))).await;
        h.feed(result("r2", "Read", json!({"error": "x"}))).await;
        let results = h.events.of_type("tool-result");
        assert_eq!(results[0]["state"], "output-available");
        assert_eq!(results[1]["state"], "output-error");
    }

    #[tokio::test]
    async fn non_string_error_values_are_errors() {
        let mut h = Harness::new();
        h.feed(result("m1", "mcp__db__query", json!({"error": {"message": "boom"}})))
            .await;
        h.feed(result("m2", "mcp__db__query", json!({"error": true}))).await;
        h.feed(result("m3", "mcp__db__query", json!({"output": {"error": {"code": 1}}})))
            .await;
        h.feed(result("m4", "mcp__db__query", json!({"error": null}))).await;
        h.feed(result("m5", "mcp__db__query", json!({"error": false}))).await;
        h.feed(result("m6", "mcp__db__query", json!({"error": 0}))).await;

        let states: Vec<Value> = h
            .events
            .of_type("tool-result")
            .into_iter()
            .map(|r| r["state"].clone())
            .collect();
        assert_eq!(
            states,
            vec![
                "output-error",
                "output-error",
                "output-error",
                "output-available",
                "output-available",
                "output-available",
            ]
        );
    }

    #[tokio::test]
    async fn string_output_is_parsed() {
        let mut h = Harness::new();
        h.feed_all(vec![
            call("r1", "Read", json!({"file_path": "missing.ts"})),
            result("r1", "Read", json!(r#"{"error":"not found"}"#)),
        ])
        .await;
        let results = h.events.of_type("tool-result");
        assert_eq!(results[0]["state"], "output-error");
        assert_eq!(results[0]["output"]["error"], "not found");
    }

    #[tokio::test]
    async fn envelope_is_unwrapped_and_states_ranked() {
        let mut h = Harness::new();
        h.feed(result("a", "bashExecute", json!({"output": {"success": true, "stdout": "ok"}})))
            .await;
        h.feed(result("b", "Edit", json!({"rejected": true, "cancelled": true})))
            .await;
        let results = h.events.of_type("tool-result");
        assert_eq!(results[0]["output"]["stdout"], "ok");
        assert_eq!(results[0]["state"], "output-available");
        assert_eq!(results[1]["state"], "output-cancelled");
        assert!(h.agent.did_reject_tool);
    }

    #[tokio::test]
    async fn is_error_flag_marks_output_error() {
        let mut h = Harness::new();
        h.feed(AgentStreamEvent::ToolResult {
            tool_call_id: "b".into(),
            tool_name: "Bash".into(),
            output: json!({"content": "exit 1"}),
            is_error: true,
        })
        .await;
        assert_eq!(h.events.of_type("tool-result")[0]["state"], "output-error");
    }

    #[tokio::test]
    async fn rejection_cascade_skips_every_later_call() {
        let mut h = Harness::new();
        h.feed(result("e1", "Edit", json!({"rejected": true}))).await;
        assert_eq!(h.events.of_type("tool-result")[0]["state"], "output-denied");

        let skipped_local = h.feed(call("w1", "writeTestFile", json!({}))).await;
        let skipped_builtin = h.feed(call("r1", "Read", json!({}))).await;
        h.feed(start("p1", "proposeTestPlan")).await;

        assert!(matches!(skipped_local, Dispatch::Skipped(_)));
        assert_eq!(skipped_builtin, Dispatch::Continue);
        assert!(h.events.of_type("tool-call").is_empty());
        let skipped = h.events.of_type("tool-skipped");
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0]["reason"], REJECTED_SKIP_REASON);
        assert_eq!(skipped[1]["toolName"], "Read");
    }

    #[tokio::test]
    async fn mistake_limit_fires_at_threshold_and_beyond() {
        let mut h = Harness::new();
        for i in 0..4 {
            h.feed(result(&format!("b{i}"), "bashExecute", json!({"success": false})))
                .await;
        }
        assert!(h.events.of_type("mistake-limit").is_empty());

        h.feed(result("b4", "bashExecute", json!({"success": false}))).await;
        let limits = h.events.of_type("mistake-limit");
        assert_eq!(limits.len(), 1);
        assert_eq!(limits[0]["count"], 5);
        assert_eq!(limits[0]["message"], MISTAKE_LIMIT_MESSAGE);

        h.feed(result("b5", "bashExecute", json!({"success": false}))).await;
        let limits = h.events.of_type("mistake-limit");
        assert_eq!(limits.len(), 2);
        assert_eq!(limits[1]["count"], 6);
    }

    #[tokio::test]
    async fn explicit_success_resets_and_neutral_keeps_counter() {
        let mut h = Harness::new();
        h.feed(result("a", "bashExecute", json!({"success": false}))).await;
        h.feed(result("b", "Read", json!({"content": "file"}))).await;
        assert_eq!(h.agent.consecutive_mistakes, 1);
        h.feed(result("c", "bashExecute", json!({"success": true}))).await;
        assert_eq!(h.agent.consecutive_mistakes, 0);
    }

    #[tokio::test]
    async fn new_diagnostics_count_as_mistake() {
        let mut h = Harness::new();
        h.feed(result(
            "w1",
            "writeTestFile",
            json!({"success": true, "message": "Saved. New diagnostic problems introduced: 2"}),
        ))
        .await;
        assert_eq!(h.agent.consecutive_mistakes, 1);
        let problems = h.events.of_type("diagnostic-problems");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0]["toolCallId"], "w1");
        assert_eq!(h.events.types().last().unwrap(), "tool-result");
    }

    #[tokio::test]
    async fn successful_file_write_records_execution() {
        let mut h = Harness::new();
        h.feed_all(vec![
            call("w1", "writeTestFile", json!({"targetPath": "src/a.test.ts"})),
            result("w1", "writeTestFile", json!({"success": true})),
            call("w2", "writeTestFile", json!({"targetPath": "src/b.test.ts"})),
            result("w2", "writeTestFile", json!({"success": false})),
            result("w3", "writeTestFile", json!({"success": true, "filePath": "src/c.test.ts"})),
        ])
        .await;
        let paths: Vec<_> = h.agent.executions.iter().map(|e| e.file_path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.test.ts", "src/c.test.ts"]);
        assert_eq!(h.agent.executions[0].test_id, "w1");
    }

    #[tokio::test]
    async fn complete_task_sets_flag() {
        let mut h = Harness::new();
        h.feed(result("c1", "completeTask", json!({"success": true, "completed": false})))
            .await;
        assert!(!h.agent.task_completed);
        h.feed(result("c2", "mcp__clive__completeTask", json!({"success": true, "completed": true})))
            .await;
        assert!(h.agent.task_completed);
    }

    #[tokio::test]
    async fn command_status_precedes_tool_call() {
        let mut h = Harness::new();
        let dispatch = h
            .feed(call("b1", "bashExecute", json!({"command": "npx vitest run src"})))
            .await;
        assert!(matches!(dispatch, Dispatch::Execute(_)));
        assert_eq!(h.events.types(), vec!["command-status", "tool-call"]);
        assert_eq!(h.events.of_type("command-status")[0]["status"], "running");
        assert_eq!(h.streaming.call_for_command("npx vitest run src"), Some("b1"));
        assert_eq!(h.events.of_type("tool-call")[0]["state"], "input-available");
    }

    #[test]
    fn command_classification() {
        assert_eq!(classify_command("cat src/a.ts"), CommandStatus::Reading);
        assert_eq!(classify_command("/usr/bin/head -n 5 x"), CommandStatus::Reading);
        assert_eq!(classify_command("rg foo src"), CommandStatus::Scanning);
        assert_eq!(classify_command("ls -la"), CommandStatus::Scanning);
        assert_eq!(classify_command("npm test -- auth"), CommandStatus::Running);
        assert_eq!(classify_command("cargo test -p core"), CommandStatus::Running);
        assert_eq!(classify_command("git status"), CommandStatus::Executing);
    }

    #[tokio::test]
    async fn todo_write_updates_snapshot() {
        let mut h = Harness::new();
        h.feed(call(
            "t1",
            "TodoWrite",
            json!({"todos": [
                {"content": "a", "status": "completed", "activeForm": "Doing a"},
                {"content": "b", "status": "in_progress"},
            ]}),
        ))
        .await;
        let updates = h.events.of_type("todos-updated");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0]["progress"]["percentComplete"], 50);
        assert_eq!(h.agent.todos.as_ref().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn native_plan_mode_events() {
        let mut h = Harness::new();
        h.feed_all(vec![
            call("e1", "EnterPlanMode", json!({})),
            start("p1", "proposeTestPlan"),
            delta("p1", "proposeTestPlan", r#"{"name": "x""#),
            call("x1", "ExitPlanMode", json!({"plan": "..."})),
        ])
        .await;
        assert_eq!(h.events.of_type("native-plan-mode-entered")[0]["toolCallId"], "e1");
        let exiting = h.events.of_type("native-plan-mode-exiting");
        assert_eq!(exiting[0]["planFilePath"], ".clive/plans/x.md");
    }

    #[tokio::test]
    async fn error_and_done() {
        let mut h = Harness::new();
        let d = h
            .feed(AgentStreamEvent::Error {
                message: "overloaded".into(),
            })
            .await;
        assert_eq!(d, Dispatch::Continue);
        assert_eq!(h.events.of_type("error")[0]["message"], "overloaded");
        assert_eq!(h.feed(AgentStreamEvent::Done).await, Dispatch::Done);
        assert!(!h.agent.task_completed);
    }
}
