//! The local tool executor handed to the execution loop.

use crate::default_registry;
use async_trait::async_trait;
use clive_core::error::ToolError;
use clive_core::tool::{ToolCall, ToolExecutor, ToolRegistry};
use std::path::Path;

/// Runs local tool calls against a [`ToolRegistry`].
pub struct LocalToolExecutor {
    registry: ToolRegistry,
}

impl LocalToolExecutor {
    /// An executor with every built-in tool, scoped to `workspace`.
    pub fn new(workspace: &Path) -> Self {
        Self::with_registry(default_registry(workspace))
    }

    pub fn with_registry(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn tool_names(&self) -> Vec<&str> {
        let mut names = self.registry.names();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl ToolExecutor for LocalToolExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<serde_json::Value, ToolError> {
        self.registry.execute(call).await
    }
}
