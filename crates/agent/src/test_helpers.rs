//! Shared fakes for dispatcher and loop tests.

use crate::collaborators::{Collaborators, PlanFileWriter, TestFileWriter};
use crate::progress::ProgressEmitter;
use async_trait::async_trait;
use clive_core::{AgentStreamEvent, ProcessError, ProcessHandle, ProcessSpawner, WriteError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Event builders ──

pub fn text(content: &str) -> AgentStreamEvent {
    AgentStreamEvent::TextDelta {
        content: content.into(),
    }
}

pub fn start(id: &str, name: &str) -> AgentStreamEvent {
    AgentStreamEvent::ToolCallStreamingStart {
        tool_call_id: id.into(),
        tool_name: name.into(),
    }
}

pub fn delta(id: &str, name: &str, delta: &str) -> AgentStreamEvent {
    AgentStreamEvent::ToolCallDelta {
        tool_call_id: id.into(),
        tool_name: name.into(),
        delta: delta.into(),
    }
}

pub fn call(id: &str, name: &str, args: Value) -> AgentStreamEvent {
    AgentStreamEvent::ToolCall {
        tool_call_id: id.into(),
        tool_name: name.into(),
        args,
    }
}

pub fn result(id: &str, name: &str, output: Value) -> AgentStreamEvent {
    AgentStreamEvent::ToolResult {
        tool_call_id: id.into(),
        tool_name: name.into(),
        output,
        is_error: false,
    }
}

// ── Progress capture ──

/// Progress events captured as `(type, parsed json)`.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<(String, Value)>>>);

impl Captured {
    pub fn types(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn of_type(&self, kind: &str) -> Vec<Value> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == kind)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<(String, Value)> {
        self.0.lock().unwrap().clone()
    }
}

pub fn capture() -> (ProgressEmitter, Captured) {
    let captured = Captured::default();
    let sink = captured.0.clone();
    let emitter = ProgressEmitter::new(Arc::new(move |kind: &str, json: &str| {
        let value: Value = serde_json::from_str(json).expect("progress payload is JSON");
        assert_eq!(value["type"], kind, "type tag must match callback name");
        sink.lock().unwrap().push((kind.to_string(), value));
    }));
    (emitter, captured)
}

// ── Writers ──

/// Records every writer call as a short string, e.g. `init:t1:a.test.ts`.
#[derive(Default)]
pub struct RecordingWriters {
    pub calls: Mutex<Vec<String>>,
    pub fail_test_init: bool,
    pub fail_plan_init: bool,
    pub fail_rename: bool,
}

impl RecordingWriters {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }
}

fn injected(path: &str) -> WriteError {
    WriteError::io(
        path,
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "injected failure"),
    )
}

#[async_trait]
impl TestFileWriter for RecordingWriters {
    async fn init_streaming_write(&self, id: &str, path: &str) -> Result<(), WriteError> {
        self.record(format!("init:{id}:{path}"));
        if self.fail_test_init {
            return Err(injected(path));
        }
        Ok(())
    }

    async fn append_streaming_content(&self, id: &str, content: &str) -> Result<(), WriteError> {
        self.record(format!("append:{id}:{content}"));
        Ok(())
    }

    async fn finalize_streaming_write(&self, id: &str) -> Result<String, WriteError> {
        self.record(format!("finalize:{id}"));
        Ok(format!("{id}.test.ts"))
    }
}

#[async_trait]
impl PlanFileWriter for RecordingWriters {
    async fn init_plan_file(&self, path: &str) -> Result<(), WriteError> {
        self.record(format!("plan-init:{path}"));
        if self.fail_plan_init {
            return Err(injected(path));
        }
        Ok(())
    }

    async fn append_plan_content(&self, path: &str, content: &str) -> Result<(), WriteError> {
        self.record(format!("plan-append:{path}:{content}"));
        Ok(())
    }

    async fn finalize_plan_file(&self, path: &str) -> Result<(), WriteError> {
        self.record(format!("plan-finalize:{path}"));
        Ok(())
    }

    async fn rename_plan_file(&self, from: &str, to: &str) -> Result<(), WriteError> {
        self.record(format!("plan-rename:{from}->{to}"));
        if self.fail_rename {
            return Err(injected(to));
        }
        Ok(())
    }
}

pub fn collaborators(writers: &Arc<RecordingWriters>) -> Collaborators {
    Collaborators::new(writers.clone(), writers.clone())
}

// ── Process ──

/// A process handle that replays a fixed script.
pub struct ScriptedProcess {
    events: VecDeque<Result<AgentStreamEvent, ProcessError>>,
    /// Block forever once the script runs out instead of ending the stream
    hang_when_empty: bool,
    pub kills: Arc<AtomicUsize>,
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    pub fail_send: bool,
}

impl ScriptedProcess {
    pub fn new(events: Vec<AgentStreamEvent>) -> Self {
        Self::with_results(events.into_iter().map(Ok).collect())
    }

    pub fn with_results(events: Vec<Result<AgentStreamEvent, ProcessError>>) -> Self {
        Self {
            events: events.into(),
            hang_when_empty: false,
            kills: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_send: false,
        }
    }

    pub fn hanging(mut self) -> Self {
        self.hang_when_empty = true;
        self
    }

    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessHandle for ScriptedProcess {
    async fn next_event(&mut self) -> Option<Result<AgentStreamEvent, ProcessError>> {
        match self.events.pop_front() {
            Some(event) => Some(event),
            None if self.hang_when_empty => std::future::pending().await,
            None => None,
        }
    }

    async fn send_result(&mut self, tool_call_id: &str, content: &str) -> Result<(), ProcessError> {
        if self.fail_send {
            return Err(ProcessError::SendFailed {
                tool_call_id: tool_call_id.into(),
                reason: "stdin closed".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((tool_call_id.to_string(), content.to_string()));
        Ok(())
    }

    fn kill(&mut self) {
        self.kills.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out one scripted process per spawn, in order.
#[derive(Default)]
pub struct ScriptedSpawner {
    scripts: Mutex<VecDeque<Vec<AgentStreamEvent>>>,
    pub prompts: Mutex<Vec<String>>,
    pub kills: Arc<AtomicUsize>,
}

impl ScriptedSpawner {
    pub fn new(scripts: Vec<Vec<AgentStreamEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        }
    }

    pub fn spawn_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessSpawner for ScriptedSpawner {
    async fn spawn(&self, prompt: &str) -> Result<Box<dyn ProcessHandle>, ProcessError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let script = self.scripts.lock().unwrap().pop_front().ok_or_else(|| ProcessError::Spawn {
            binary: "scripted".into(),
            reason: "no script left".into(),
        })?;
        let mut process = ScriptedProcess::new(script);
        process.kills = self.kills.clone();
        Ok(Box::new(process))
    }
}
