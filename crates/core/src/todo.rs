//! Todo list tracked across iterations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Completed => "completed",
        }
    }

    /// Lenient parse; unknown statuses count as pending.
    pub fn parse(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "in_progress" | "in progress" | "in-progress" => TodoStatus::InProgress,
            "completed" | "complete" | "done" => TodoStatus::Completed,
            _ => TodoStatus::Pending,
        }
    }
}

impl std::fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub content: String,
    pub status: TodoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_form: Option<String>,
}

impl Todo {
    pub fn new(content: impl Into<String>, status: TodoStatus) -> Self {
        Self {
            content: content.into(),
            status,
            active_form: None,
        }
    }

    /// Parse the `todos` array of a todo-writing tool call.
    ///
    /// Entries without a `content` string are dropped.
    pub fn list_from_args(args: &serde_json::Value) -> Option<Vec<Todo>> {
        let entries = args.get("todos")?.as_array()?;
        let todos = entries
            .iter()
            .filter_map(|entry| {
                let content = entry.get("content")?.as_str()?;
                let status = entry
                    .get("status")
                    .and_then(|s| s.as_str())
                    .map(TodoStatus::parse)
                    .unwrap_or_default();
                let active_form = entry
                    .get("activeForm")
                    .and_then(|s| s.as_str())
                    .map(str::to_string);
                Some(Todo {
                    content: content.to_string(),
                    status,
                    active_form,
                })
            })
            .collect();
        Some(todos)
    }
}

/// Summary of a todo list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoProgress {
    pub completed: usize,
    pub pending: usize,
    pub total: usize,
    pub percent_complete: u32,
}

impl TodoProgress {
    /// `pending` counts everything not yet completed, including in-progress items.
    pub fn of(todos: &[Todo]) -> Self {
        let total = todos.len();
        let completed = todos
            .iter()
            .filter(|t| t.status == TodoStatus::Completed)
            .count();
        let percent_complete = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            completed,
            pending: total - completed,
            total,
            percent_complete,
        }
    }
}
