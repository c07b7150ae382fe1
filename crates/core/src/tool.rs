//! Tool calls, tool naming, and the local tool abstraction.
//!
//! Most tools are executed outside the core: CLI built-ins run inside the
//! agent process and MCP tools run on an MCP server. The remaining tools are
//! executed locally through a [`ToolExecutor`], usually a [`ToolRegistry`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::ToolError;

/// Writes a test file; its arguments stream in and are written incrementally.
pub const WRITE_TEST_FILE: &str = "writeTestFile";
/// Proposes a test plan; streamed into a markdown file under the plans dir.
pub const PROPOSE_TEST_PLAN: &str = "proposeTestPlan";
/// Runs a shell command locally.
pub const BASH_EXECUTE: &str = "bashExecute";
/// Signals that the agent considers the task finished.
pub const COMPLETE_TASK: &str = "completeTask";

const MCP_PREFIX: &str = "mcp__";

/// Tools that the agent CLI executes itself.
const CLI_BUILTINS: &[&str] = &[
    "Bash",
    "BashOutput",
    "KillShell",
    "Read",
    "Write",
    "Edit",
    "MultiEdit",
    "NotebookEdit",
    "Glob",
    "Grep",
    "LS",
    "TodoWrite",
    "Task",
    "WebFetch",
    "WebSearch",
    "EnterPlanMode",
    "ExitPlanMode",
];

/// A request to execute a tool, with fully resolved arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the agent's tool_use id)
    pub id: String,

    /// Name of the tool as the agent sent it (may be MCP-namespaced)
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// A tool name resolved for routing and display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolName {
    /// The name as received
    pub raw: String,
    /// The name shown in the UI and used for routing
    pub display: String,
    /// True when the raw name carries the MCP prefix
    pub is_mcp: bool,
}

impl ToolName {
    /// Resolve `mcp__server__tool` names.
    ///
    /// With three or more `__` segments the display name is everything after
    /// the second one; with only two the raw name is kept as is.
    pub fn parse(raw: &str) -> Self {
        let is_mcp = raw.starts_with(MCP_PREFIX);
        let display = if is_mcp {
            let segments: Vec<&str> = raw.split("__").collect();
            if segments.len() >= 3 {
                segments[2..].join("__")
            } else {
                raw.to_string()
            }
        } else {
            raw.to_string()
        };
        Self {
            raw: raw.to_string(),
            display,
            is_mcp,
        }
    }

    pub fn kind(&self) -> ToolKind {
        ToolKind::of(&self.display)
    }

    /// Executed by the agent CLI itself.
    pub fn is_builtin(&self) -> bool {
        !self.is_mcp && CLI_BUILTINS.contains(&self.raw.as_str())
    }

    /// Neither a CLI built-in nor MCP-routed, so the core executes it.
    pub fn is_local(&self) -> bool {
        !self.is_mcp && !self.is_builtin()
    }
}

/// Routing category of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    FileWrite,
    PlanProposal,
    Command,
    CompleteTask,
    TodoWrite,
    EnterPlanMode,
    ExitPlanMode,
    Other,
}

impl ToolKind {
    pub fn of(display_name: &str) -> Self {
        match display_name {
            WRITE_TEST_FILE => Self::FileWrite,
            PROPOSE_TEST_PLAN => Self::PlanProposal,
            BASH_EXECUTE | "Bash" => Self::Command,
            COMPLETE_TASK => Self::CompleteTask,
            "TodoWrite" | "todoWrite" => Self::TodoWrite,
            "EnterPlanMode" => Self::EnterPlanMode,
            "ExitPlanMode" => Self::ExitPlanMode,
            _ => Self::Other,
        }
    }

    /// Kinds whose argument deltas are consumed while they stream.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::FileWrite | Self::PlanProposal)
    }
}

/// The result of a local tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// Human-readable outcome
    pub output: String,

    /// Optional structured data merged into the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// JSON payload reported to the UI and forwarded to the agent.
    ///
    /// Object-valued `data` fields are merged at the top level next to
    /// `success` and `message`.
    pub fn to_payload(&self) -> serde_json::Value {
        let mut payload = match &self.data {
            Some(serde_json::Value::Object(map)) => map.clone(),
            Some(other) => {
                let mut map = serde_json::Map::new();
                map.insert("data".into(), other.clone());
                map
            }
            None => serde_json::Map::new(),
        };
        payload.insert("success".into(), serde_json::Value::Bool(self.success));
        payload.insert("message".into(), serde_json::Value::String(self.output.clone()));
        serde_json::Value::Object(payload)
    }
}

/// Executes tool calls that neither the agent CLI nor an MCP server handles.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> std::result::Result<serde_json::Value, ToolError>;
}

/// A single locally executable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "bashExecute").
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;
}

/// A registry of available local tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, call: &ToolCall) -> std::result::Result<serde_json::Value, ToolError> {
        let name = ToolName::parse(&call.name);
        let tool = self
            .tools
            .get(&name.display)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let result = tool.execute(call.arguments.clone()).await?;
        Ok(result.to_payload())
    }
}
