//! The iteration loop ("Ralph Wiggum" loop).
//!
//! Runs the execution loop again and again, each time in a fresh agent
//! process with a prompt rebuilt from the accumulated loop state, until the
//! agent calls the completion tool, the iteration cap is hit, the run is
//! cancelled, or an iteration fails.
//!
//! Every run emits exactly one `loop-complete`. Iteration N's
//! `loop-iteration-complete` is always emitted before iteration N+1's
//! `loop-iteration-start`.

use crate::loop_runner::ExecutionLoop;
use crate::loop_state::LoopState;
use crate::progress::{LoopCompleteReason, ProgressEvent};
use crate::prompt::{PromptContext, build_iteration_prompt};
use clive_core::{AgentState, ExecutionRecord, Message, ProcessSpawner, Todo, TodoProgress};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Final state of an iteration loop run.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    pub reason: LoopCompleteReason,
    /// Iteration number reached when the loop stopped
    pub iteration: u32,
    pub todos: Vec<Todo>,
    pub progress: TodoProgress,
    /// Files written across all iterations
    pub executions: Vec<ExecutionRecord>,
    /// Response text of the last iteration that ran
    pub last_response: String,
}

pub struct IterationLoop {
    spawner: Arc<dyn ProcessSpawner>,
    execution: ExecutionLoop,
    context: PromptContext,
    max_iterations: u32,
    carry_agent_state: bool,
}

impl IterationLoop {
    pub fn new(
        spawner: Arc<dyn ProcessSpawner>,
        execution: ExecutionLoop,
        context: PromptContext,
    ) -> Self {
        Self {
            spawner,
            execution,
            context,
            max_iterations: 10,
            carry_agent_state: false,
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Thread one agent state through every iteration instead of starting
    /// each one clean. Rejections and mistake counts then persist.
    pub fn with_carried_agent_state(mut self, carry: bool) -> Self {
        self.carry_agent_state = carry;
        self
    }

    pub async fn run(&self, cancel: &CancellationToken) -> IterationOutcome {
        let emitter = self.execution.emitter();
        let mut state = LoopState::new(self.max_iterations);
        let mut carried = AgentState::new();
        let mut executions = Vec::new();
        let mut last_response = String::new();

        let reason = loop {
            if cancel.is_cancelled() {
                info!(iteration = state.iteration, "Loop cancelled before next iteration");
                break LoopCompleteReason::Cancelled;
            }

            state.iteration += 1;
            info!(
                iteration = state.iteration,
                max_iterations = state.max_iterations,
                "Starting loop iteration"
            );
            emitter.emit(ProgressEvent::LoopIterationStart {
                iteration: state.iteration,
                max_iterations: state.max_iterations,
            });

            let prompt = build_iteration_prompt(&self.context, &state);
            let spawned = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                spawned = self.spawner.spawn(&prompt) => Some(spawned),
            };
            let mut handle = match spawned {
                None => {
                    info!(iteration = state.iteration, "Loop cancelled while starting agent process");
                    break LoopCompleteReason::Cancelled;
                }
                Some(Ok(handle)) => handle,
                Some(Err(e)) => {
                    warn!(iteration = state.iteration, "Failed to start agent process: {e}");
                    emitter.emit(ProgressEvent::Error {
                        message: e.to_string(),
                    });
                    break LoopCompleteReason::Error;
                }
            };

            let mut agent = if self.carry_agent_state {
                std::mem::take(&mut carried)
            } else {
                AgentState::new()
            };
            agent.push_message(Message::user(&prompt));

            let result = self.execution.run(handle.as_mut(), &mut agent, cancel).await;
            handle.kill();

            state.merge_todos(result.todos.clone());
            executions.extend(result.executions.iter().cloned());
            last_response = result.response.clone();

            emitter.emit(ProgressEvent::LoopIterationComplete {
                iteration: state.iteration,
                todos: state.todos.clone(),
                progress: state.progress(),
            });

            if self.carry_agent_state {
                carried = agent;
            }

            if result.cancelled {
                break LoopCompleteReason::Cancelled;
            }
            if result.task_completed {
                break LoopCompleteReason::Complete;
            }
            if !result.success {
                break LoopCompleteReason::Error;
            }
            if state.at_limit() {
                break LoopCompleteReason::MaxIterations;
            }
        };

        state.reason = Some(reason);
        info!(reason = %reason, iteration = state.iteration, "Loop finished");
        emitter.emit(ProgressEvent::LoopComplete {
            reason,
            iteration: state.iteration,
            todos: state.todos.clone(),
            progress: state.progress(),
        });

        IterationOutcome {
            reason,
            iteration: state.iteration,
            progress: state.progress(),
            todos: state.todos,
            executions,
            last_response,
        }
    }
}
