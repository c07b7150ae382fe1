//! Error types for the clive domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all clive operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Process / transport errors ---
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    // --- File side-effect errors ---
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the agent process or the stream it produces.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    #[error("Failed to spawn agent process '{binary}': {reason}")]
    Spawn { binary: String, reason: String },

    #[error("Agent process I/O failed: {0}")]
    Io(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Agent process exited with status {code}: {stderr}")]
    Exited { code: i32, stderr: String },

    #[error("Failed to send tool result for {tool_call_id}: {reason}")]
    SendFailed { tool_call_id: String, reason: String },
}

/// Failures of the injected file collaborators.
///
/// These are always swallowed and logged by the dispatcher.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No streaming write initialized for {0}")]
    NotInitialized(String),

    #[error("Path rejected: {path} — {reason}")]
    PathRejected { path: String, reason: String },
}

impl WriteError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name} — {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
