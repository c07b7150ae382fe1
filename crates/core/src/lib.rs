//! # clive core
//!
//! Domain types, traits, and error definitions for the clive agent
//! streaming core. This crate has **no runtime dependencies** beyond
//! serialization: it defines the model the transport, dispatcher and
//! collaborator crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (agent process, local tools) is a trait here.
//! Implementations live in their respective crates, so the dispatcher and
//! loops can be driven by scripted handles in tests.

pub mod error;
pub mod message;
pub mod tool;
pub mod agent;
pub mod process;
pub mod todo;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProcessError, Result, ToolError, WriteError};
pub use message::{Message, Role};
pub use tool::{Tool, ToolCall, ToolExecutor, ToolKind, ToolName, ToolRegistry, ToolResult};
pub use agent::{AgentState, ExecutionRecord};
pub use process::{AgentStreamEvent, ProcessHandle, ProcessSpawner};
pub use todo::{Todo, TodoProgress, TodoStatus};
