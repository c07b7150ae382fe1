//! `writeTestFile`: write a whole test file in one call.
//!
//! While the arguments stream, the dispatcher already writes the file through
//! the streaming writer. Executing the call writes the final content again so
//! the file is complete even when no delta was seen.

use crate::path::resolve_in_workspace;
use async_trait::async_trait;
use clive_core::error::ToolError;
use clive_core::tool::{Tool, ToolResult, WRITE_TEST_FILE};
use std::path::PathBuf;

pub struct WriteTestFileTool {
    workspace: PathBuf,
}

impl WriteTestFileTool {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }
}

#[async_trait]
impl Tool for WriteTestFileTool {
    fn name(&self) -> &str {
        WRITE_TEST_FILE
    }

    fn description(&self) -> &str {
        "Write a test file. Creates parent directories and overwrites an existing file."
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let target = arguments["targetPath"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'targetPath' argument".into()))?;
        let content = arguments["testContent"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'testContent' argument".into()))?;

        let path = resolve_in_workspace(&self.workspace, target).map_err(|e| {
            ToolError::PermissionDenied {
                tool_name: WRITE_TEST_FILE.into(),
                reason: e.to_string(),
            }
        })?;

        if let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolResult::failed(format!("Failed to create directory: {e}")));
        }

        match tokio::fs::write(&path, content).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "Wrote {} bytes to {target}",
                content.len()
            ))
            .with_data(serde_json::json!({ "filePath": target }))),
            Err(e) => Ok(ToolResult::failed(format!("Failed to write file: {e}"))),
        }
    }
}
