//! Workspace path validation.
//!
//! Every path the agent names is resolved against the workspace root and
//! must stay inside it, including after symlinks are resolved.

use clive_core::WriteError;
use std::path::{Component, Path, PathBuf};

/// Error returned when a path may not be written.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path is empty")]
    Empty,

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path '{path}' is outside the workspace")]
    OutsideWorkspace { path: String },
}

impl PathValidationError {
    fn path(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::PathTraversal { path } | Self::OutsideWorkspace { path } => path,
        }
    }
}

impl From<PathValidationError> for WriteError {
    fn from(err: PathValidationError) -> Self {
        WriteError::PathRejected {
            path: err.path().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Resolve `path` inside `root`.
///
/// Relative paths are joined to the root; absolute paths must already lie
/// under it. The deepest existing ancestor is canonicalized so a symlinked
/// directory cannot point outside the workspace.
pub fn resolve_in_workspace(root: &Path, path: &str) -> Result<PathBuf, PathValidationError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(PathValidationError::Empty);
    }

    let input = Path::new(trimmed);
    if input.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(PathValidationError::PathTraversal { path: path.into() });
    }

    let candidate = if input.is_absolute() {
        if !input.starts_with(root) {
            return Err(PathValidationError::OutsideWorkspace { path: path.into() });
        }
        input.to_path_buf()
    } else {
        root.join(input)
    };

    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let mut ancestor = candidate.as_path();
    while !ancestor.exists() {
        match ancestor.parent() {
            Some(parent) => ancestor = parent,
            None => break,
        }
    }
    if let Ok(resolved) = ancestor.canonicalize()
        && !resolved.starts_with(&canonical_root)
    {
        return Err(PathValidationError::OutsideWorkspace { path: path.into() });
    }

    Ok(candidate)
}
