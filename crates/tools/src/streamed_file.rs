//! A file written from ever-growing accumulated content.

use clive_core::WriteError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Tracks what has already been written so appends only touch the new tail.
#[derive(Debug)]
pub(crate) struct StreamedFile {
    path: PathBuf,
    written: String,
}

impl StreamedFile {
    /// Create parent directories and an empty file.
    pub(crate) async fn create(path: PathBuf) -> Result<Self, WriteError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WriteError::io(parent.display().to_string(), e))?;
        }
        tokio::fs::write(&path, "")
            .await
            .map_err(|e| WriteError::io(path.display().to_string(), e))?;
        Ok(Self {
            path,
            written: String::new(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn moved_to(&mut self, path: PathBuf) {
        self.path = path;
    }

    /// Bring the file in line with `content`, the whole content so far.
    ///
    /// Extends the file when `content` continues what was written, otherwise
    /// rewrites it.
    pub(crate) async fn write_accumulated(&mut self, content: &str) -> Result<(), WriteError> {
        if content == self.written {
            return Ok(());
        }
        let io_err = |e| WriteError::io(self.path.display().to_string(), e);
        match content.strip_prefix(self.written.as_str()) {
            Some(suffix) => {
                let mut file = tokio::fs::OpenOptions::new()
                    .append(true)
                    .open(&self.path)
                    .await
                    .map_err(io_err)?;
                file.write_all(suffix.as_bytes()).await.map_err(io_err)?;
                file.flush().await.map_err(io_err)?;
            }
            None => tokio::fs::write(&self.path, content).await.map_err(io_err)?,
        }
        self.written = content.to_string();
        Ok(())
    }
}
