//! Side-effect collaborators injected into the dispatcher.
//!
//! The dispatcher never touches the filesystem itself. It calls these traits
//! in order (init, append, finalize) per tool call, and treats every failure
//! as best-effort.

use async_trait::async_trait;
use clive_core::{ToolExecutor, WriteError};
use std::sync::Arc;

/// Streams a test file to disk while its `writeTestFile` arguments arrive.
#[async_trait]
pub trait TestFileWriter: Send + Sync {
    /// Prepare `target_path` for streaming content owned by `tool_call_id`.
    async fn init_streaming_write(
        &self,
        tool_call_id: &str,
        target_path: &str,
    ) -> Result<(), WriteError>;

    /// Write the unescaped content received so far.
    ///
    /// `content` is the whole content accumulated for the call, not a delta.
    async fn append_streaming_content(
        &self,
        tool_call_id: &str,
        content: &str,
    ) -> Result<(), WriteError>;

    /// Flush and forget the call. Returns the written path.
    async fn finalize_streaming_write(&self, tool_call_id: &str) -> Result<String, WriteError>;
}

/// Streams a plan markdown file, keyed by its path.
#[async_trait]
pub trait PlanFileWriter: Send + Sync {
    async fn init_plan_file(&self, path: &str) -> Result<(), WriteError>;

    /// `content` is the whole plan content accumulated so far.
    async fn append_plan_content(&self, path: &str, content: &str) -> Result<(), WriteError>;

    async fn finalize_plan_file(&self, path: &str) -> Result<(), WriteError>;

    async fn rename_plan_file(&self, from: &str, to: &str) -> Result<(), WriteError>;
}

/// Everything the dispatcher and execution loop delegate to.
#[derive(Clone)]
pub struct Collaborators {
    pub test_files: Arc<dyn TestFileWriter>,
    pub plan_files: Arc<dyn PlanFileWriter>,
    /// Executes local tools. Without one, local tool calls report failure.
    pub tool_executor: Option<Arc<dyn ToolExecutor>>,
}

impl Collaborators {
    pub fn new(test_files: Arc<dyn TestFileWriter>, plan_files: Arc<dyn PlanFileWriter>) -> Self {
        Self {
            test_files,
            plan_files,
            tool_executor: None,
        }
    }

    pub fn with_tool_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.tool_executor = Some(executor);
        self
    }
}
