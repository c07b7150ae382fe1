//! Agent process transport.
//!
//! Runs the Claude CLI with `stream-json` I/O and adapts its NDJSON output to
//! [`clive_core::AgentStreamEvent`]s.

pub mod claude_cli;
pub mod parser;

pub use claude_cli::{ClaudeCliProcess, ClaudeCliSpawner, CliOptions};
pub use parser::{StreamJsonParser, tool_result_message, user_message};
