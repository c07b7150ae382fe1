//! The agent streaming core.
//!
//! Consumes the incremental event stream of an agent process and turns it
//! into file side effects and a stable progress-event protocol:
//!
//! 1. **Extract** string fields from partial tool-call JSON as it streams
//! 2. **Dispatch** each event: update state, call writers, emit progress
//! 3. **Execute** one process to completion, answering local tool calls
//! 4. **Iterate** with fresh processes until the task completes or the cap is hit
//!
//! Cancellation is a [`tokio_util::sync::CancellationToken`] checked between
//! events; the process is killed as soon as it fires.

pub mod collaborators;
pub mod dispatcher;
pub mod iteration;
pub mod loop_runner;
pub mod loop_state;
pub mod partial_json;
pub mod progress;
pub mod prompt;
pub mod streaming_state;
pub mod text;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use collaborators::{Collaborators, PlanFileWriter, TestFileWriter};
pub use dispatcher::{Dispatch, EventDispatcher};
pub use iteration::{IterationLoop, IterationOutcome};
pub use loop_runner::{ExecutionLoop, ExecutionResult};
pub use loop_state::LoopState;
pub use partial_json::{ArraySummary, extract_array_summary, extract_field};
pub use progress::{
    CommandStatus, LoopCompleteReason, ProgressCallback, ProgressEmitter, ProgressEvent,
    ToolCallState, ToolResultState,
};
pub use prompt::{PromptContext, build_iteration_prompt};
pub use streaming_state::{PlanInitStatus, StreamingState};
pub use text::{sanitize_plan_name, unescape_json_string};
