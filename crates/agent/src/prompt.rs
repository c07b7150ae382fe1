//! Prompt rebuilt for every iteration from the loop state.

use crate::loop_state::LoopState;
use clive_core::TodoStatus;
use clive_core::tool::COMPLETE_TASK;
use std::fmt::Write;

/// Inputs that stay fixed for a whole iteration loop run.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub workspace_root: String,
    /// Approved plan the agent works through
    pub plan_path: Option<String>,
    /// Free-form instruction from the user
    pub task: Option<String>,
}

pub fn build_iteration_prompt(context: &PromptContext, state: &LoopState) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are writing tests in the workspace at {}.",
        context.workspace_root
    );
    let _ = writeln!(
        prompt,
        "This is iteration {} of at most {}. Each iteration starts with a fresh context.",
        state.iteration, state.max_iterations
    );

    if let Some(plan) = &context.plan_path {
        let _ = writeln!(prompt, "\nFollow the approved test plan in {plan}.");
    }
    if let Some(task) = &context.task {
        let _ = writeln!(prompt, "\nTask: {task}");
    }

    if !state.todos.is_empty() {
        let progress = state.progress();
        let _ = writeln!(
            prompt,
            "\nProgress so far: {}/{} done ({}%).",
            progress.completed, progress.total, progress.percent_complete
        );
        for todo in &state.todos {
            let mark = match todo.status {
                TodoStatus::Completed => "x",
                TodoStatus::InProgress => "~",
                TodoStatus::Pending => " ",
            };
            let _ = writeln!(prompt, "- [{mark}] {}", todo.content);
        }
        let _ = writeln!(prompt, "Continue with the first unfinished item.");
    }

    let _ = write!(
        prompt,
        "\nKeep the todo list current. When every planned test is written and passing, call {COMPLETE_TASK} with completed set to true."
    );
    prompt
}
