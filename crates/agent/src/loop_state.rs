//! State carried across iterations of the iteration loop.

use crate::progress::LoopCompleteReason;
use clive_core::{Todo, TodoProgress};

#[derive(Debug, Clone, PartialEq)]
pub struct LoopState {
    /// 1-based number of the current iteration, 0 before the first one
    pub iteration: u32,
    pub max_iterations: u32,
    pub todos: Vec<Todo>,
    /// Set once the loop reached a terminal state
    pub reason: Option<LoopCompleteReason>,
}

impl LoopState {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            todos: Vec::new(),
            reason: None,
        }
    }

    pub fn progress(&self) -> TodoProgress {
        TodoProgress::of(&self.todos)
    }

    /// Replace the todo list with a newer snapshot, if one was reported.
    pub fn merge_todos(&mut self, snapshot: Option<Vec<Todo>>) {
        if let Some(todos) = snapshot {
            self.todos = todos;
        }
    }

    pub fn at_limit(&self) -> bool {
        self.iteration >= self.max_iterations
    }
}
