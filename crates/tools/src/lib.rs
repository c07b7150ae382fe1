//! Filesystem side effects and local tools for clive.
//!
//! - [`FsTestFileWriter`] and [`FsPlanWriter`] stream test and plan files to
//!   disk for the dispatcher.
//! - [`LocalToolExecutor`] runs the tools the agent CLI does not handle
//!   itself: shell commands, test file writes, plan proposals and task
//!   completion.
//!
//! Every path is resolved inside the workspace root.

pub mod executor;
pub mod file_write;
pub mod path;
pub mod shell;
mod streamed_file;
pub mod task;
pub mod writers;

use clive_core::tool::ToolRegistry;
use std::path::Path;

pub use executor::LocalToolExecutor;
pub use path::{PathValidationError, resolve_in_workspace};
pub use writers::{FsPlanWriter, FsTestFileWriter};

/// Create a registry with all built-in local tools scoped to `workspace`.
pub fn default_registry(workspace: &Path) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(shell::BashExecuteTool::new(workspace)));
    registry.register(Box::new(file_write::WriteTestFileTool::new(workspace)));
    registry.register(Box::new(task::ProposeTestPlanTool));
    registry.register(Box::new(task::CompleteTaskTool));
    registry
}
