//! Filesystem implementations of the streaming writers.

use crate::path::resolve_in_workspace;
use crate::streamed_file::StreamedFile;
use async_trait::async_trait;
use clive_agent::{PlanFileWriter, TestFileWriter};
use clive_core::WriteError;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

/// Writes test files under the workspace root as their content streams in.
pub struct FsTestFileWriter {
    root: PathBuf,
    /// tool call id -> (target as given, file)
    files: Mutex<HashMap<String, (String, StreamedFile)>>,
}

impl FsTestFileWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TestFileWriter for FsTestFileWriter {
    async fn init_streaming_write(
        &self,
        tool_call_id: &str,
        target_path: &str,
    ) -> Result<(), WriteError> {
        let path = resolve_in_workspace(&self.root, target_path)?;
        let file = StreamedFile::create(path).await?;
        debug!(tool_call_id = %tool_call_id, path = %file.path().display(), "Test file opened");
        self.files
            .lock()
            .await
            .insert(tool_call_id.to_string(), (target_path.to_string(), file));
        Ok(())
    }

    async fn append_streaming_content(
        &self,
        tool_call_id: &str,
        content: &str,
    ) -> Result<(), WriteError> {
        let mut files = self.files.lock().await;
        let (_, file) = files
            .get_mut(tool_call_id)
            .ok_or_else(|| WriteError::NotInitialized(tool_call_id.to_string()))?;
        file.write_accumulated(content).await
    }

    async fn finalize_streaming_write(&self, tool_call_id: &str) -> Result<String, WriteError> {
        let (target, _) = self
            .files
            .lock()
            .await
            .remove(tool_call_id)
            .ok_or_else(|| WriteError::NotInitialized(tool_call_id.to_string()))?;
        Ok(target)
    }
}

/// Writes plan markdown files, keyed by their workspace-relative path.
pub struct FsPlanWriter {
    root: PathBuf,
    files: Mutex<HashMap<String, StreamedFile>>,
}

impl FsPlanWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PlanFileWriter for FsPlanWriter {
    async fn init_plan_file(&self, path: &str) -> Result<(), WriteError> {
        let resolved = resolve_in_workspace(&self.root, path)?;
        let file = StreamedFile::create(resolved).await?;
        debug!(path = %path, "Plan file opened");
        self.files.lock().await.insert(path.to_string(), file);
        Ok(())
    }

    async fn append_plan_content(&self, path: &str, content: &str) -> Result<(), WriteError> {
        let mut files = self.files.lock().await;
        let file = files
            .get_mut(path)
            .ok_or_else(|| WriteError::NotInitialized(path.to_string()))?;
        file.write_accumulated(content).await
    }

    async fn finalize_plan_file(&self, path: &str) -> Result<(), WriteError> {
        self.files
            .lock()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| WriteError::NotInitialized(path.to_string()))
    }

    async fn rename_plan_file(&self, from: &str, to: &str) -> Result<(), WriteError> {
        let source = resolve_in_workspace(&self.root, from)?;
        let target = resolve_in_workspace(&self.root, to)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WriteError::io(to, e))?;
        }
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| WriteError::io(from, e))?;

        let mut files = self.files.lock().await;
        if let Some(mut file) = files.remove(from) {
            file.moved_to(target);
            files.insert(to.to_string(), file);
        }
        debug!(from = %from, to = %to, "Plan file renamed");
        Ok(())
    }
}
