//! The execution loop: one agent process, consumed to completion.

use crate::collaborators::Collaborators;
use crate::dispatcher::{Dispatch, EventDispatcher, REJECTED_SKIP_REASON};
use crate::progress::{ProgressEmitter, ProgressEvent};
use crate::streaming_state::StreamingState;
use clive_core::{
    AgentState, AgentStreamEvent, ExecutionRecord, Message, ProcessError, ProcessHandle, Todo,
    ToolCall,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Summary of one execution loop pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    /// False when the pass was cancelled or the transport failed
    pub success: bool,
    pub cancelled: bool,
    /// Concatenation of every text delta, in arrival order
    pub response: String,
    pub task_completed: bool,
    /// Latest todo snapshot, if the agent reported one
    pub todos: Option<Vec<Todo>>,
    /// Files written during this pass
    pub executions: Vec<ExecutionRecord>,
    pub error: Option<String>,
}

enum Step {
    Cancelled,
    Event(Option<Result<AgentStreamEvent, ProcessError>>),
}

/// Drives a process handle's event stream through the dispatcher.
pub struct ExecutionLoop {
    dispatcher: EventDispatcher,
}

impl ExecutionLoop {
    pub fn new(collaborators: Collaborators, emitter: ProgressEmitter) -> Self {
        Self {
            dispatcher: EventDispatcher::new(collaborators, emitter),
        }
    }

    pub fn with_plans_dir(mut self, dir: impl Into<String>) -> Self {
        self.dispatcher = self.dispatcher.with_plans_dir(dir);
        self
    }

    pub fn with_mistake_limit(mut self, limit: u32) -> Self {
        self.dispatcher = self.dispatcher.with_mistake_limit(limit);
        self
    }

    pub fn emitter(&self) -> &ProgressEmitter {
        self.dispatcher.emitter()
    }

    /// Consume events until `done`, end of stream, a transport failure or
    /// cancellation.
    ///
    /// On cancellation the process is killed and no further events are read.
    /// Events already emitted are never retracted.
    pub async fn run(
        &self,
        handle: &mut dyn ProcessHandle,
        agent: &mut AgentState,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let mut streaming = StreamingState::new();
        let mut response = String::new();
        let mut cancelled = false;
        let mut error = None;
        let executions_before = agent.executions.len();

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                event = handle.next_event() => Step::Event(event),
            };

            let event = match step {
                Step::Cancelled => {
                    info!("Execution cancelled, killing agent process");
                    handle.kill();
                    cancelled = true;
                    break;
                }
                Step::Event(None) => {
                    debug!("Agent stream ended without done");
                    break;
                }
                Step::Event(Some(Err(e))) => {
                    warn!("Agent stream failed: {e}");
                    self.dispatcher.emitter().emit(ProgressEvent::Error {
                        message: e.to_string(),
                    });
                    error = Some(e.to_string());
                    break;
                }
                Step::Event(Some(Ok(event))) => event,
            };

            if let AgentStreamEvent::TextDelta { content } = &event {
                response.push_str(content);
            }

            let outcome = match self.dispatcher.dispatch(event, agent, &mut streaming).await {
                Dispatch::Continue => Ok(()),
                Dispatch::Done => break,
                Dispatch::Execute(call) => {
                    let payload = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        payload = self.execute_local(&call) => Some(payload),
                    };
                    match payload {
                        // Cancellation is picked up at the top of the loop.
                        None => continue,
                        Some(payload) => {
                            self.answer(handle, &call, payload, agent, &mut streaming)
                                .await
                        }
                    }
                }
                Dispatch::Skipped(call) => {
                    let payload = json!({
                        "success": false,
                        "skipped": true,
                        "reason": REJECTED_SKIP_REASON,
                    });
                    handle.send_result(&call.id, &payload.to_string()).await
                }
            };

            if let Err(e) = outcome {
                warn!("Failed to return tool result to agent: {e}");
                self.dispatcher.emitter().emit(ProgressEvent::Error {
                    message: e.to_string(),
                });
                error = Some(e.to_string());
                break;
            }
        }

        if !response.is_empty() {
            agent.push_message(Message::assistant(&response));
        }

        ExecutionResult {
            success: !cancelled && error.is_none(),
            cancelled,
            response,
            task_completed: agent.task_completed,
            todos: agent.todos.clone(),
            executions: agent.executions[executions_before..].to_vec(),
            error,
        }
    }

    async fn execute_local(&self, call: &ToolCall) -> Value {
        let Some(executor) = &self.dispatcher.collaborators().tool_executor else {
            return json!({
                "success": false,
                "error": format!("No local executor available for {}", call.name),
            });
        };
        debug!(tool_call_id = %call.id, tool = %call.name, "Executing local tool");
        match executor.execute(call).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(tool_call_id = %call.id, tool = %call.name, error = %e, "Local tool failed");
                json!({ "success": false, "error": e.to_string() })
            }
        }
    }

    /// Dispatch a local result like any other, then hand it to the agent.
    async fn answer(
        &self,
        handle: &mut dyn ProcessHandle,
        call: &ToolCall,
        payload: Value,
        agent: &mut AgentState,
        streaming: &mut StreamingState,
    ) -> Result<(), ProcessError> {
        let content = payload.to_string();
        let result = AgentStreamEvent::ToolResult {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            output: payload,
            is_error: false,
        };
        self.dispatcher.dispatch(result, agent, streaming).await;
        handle.send_result(&call.id, &content).await
    }
}
