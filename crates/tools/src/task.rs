//! Planning and completion tools: `proposeTestPlan` and `completeTask`.

use async_trait::async_trait;
use clive_core::error::ToolError;
use clive_core::tool::{COMPLETE_TASK, PROPOSE_TEST_PLAN, Tool, ToolResult};
use serde::Deserialize;

/// Acknowledges a proposed plan. The plan file itself is streamed by the
/// dispatcher while the arguments arrive.
pub struct ProposeTestPlanTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanArgs {
    name: String,
    #[serde(default)]
    suites: Vec<serde_json::Value>,
    #[serde(default)]
    plan_content: String,
}

#[async_trait]
impl Tool for ProposeTestPlanTool {
    fn name(&self) -> &str {
        PROPOSE_TEST_PLAN
    }

    fn description(&self) -> &str {
        "Propose a test plan as markdown, with the suites it will produce."
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: PlanArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.plan_content.trim().is_empty() {
            return Ok(ToolResult::failed("Plan content is empty"));
        }
        Ok(ToolResult::ok(format!("Test plan '{}' proposed", args.name)).with_data(
            serde_json::json!({
                "planName": args.name,
                "suiteCount": args.suites.len(),
            }),
        ))
    }
}

/// Lets the agent declare the task finished, ending the iteration loop.
pub struct CompleteTaskTool;

#[derive(Deserialize)]
struct CompleteArgs {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default = "default_completed")]
    completed: bool,
}

fn default_completed() -> bool {
    true
}

#[async_trait]
impl Tool for CompleteTaskTool {
    fn name(&self) -> &str {
        COMPLETE_TASK
    }

    fn description(&self) -> &str {
        "Mark the task as complete once every planned test is written and passing."
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: CompleteArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let message = match (&args.summary, args.completed) {
            (Some(summary), _) => summary.clone(),
            (None, true) => "Task marked complete".to_string(),
            (None, false) => "Task not yet complete".to_string(),
        };
        Ok(ToolResult::ok(message).with_data(serde_json::json!({ "completed": args.completed })))
    }
}
