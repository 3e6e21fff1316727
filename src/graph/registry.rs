// src/graph/registry.rs

//! Per-graph task registry.
//!
//! The registry maps task names to task implementations. It is populated
//! while the graph is being defined and read-only afterwards, so concurrent
//! runs can look tasks up without synchronisation. Each graph owns its own
//! registry; there is no process-global task table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::task::{Task, TaskName};

/// Name → implementation mapping for one graph.
pub struct TaskRegistry<I: Sync, S: Sync> {
    tasks: HashMap<TaskName, Arc<dyn Task<I, S>>>,
}

impl<I: Sync, S: Sync> Default for TaskRegistry<I, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Sync, S: Sync> TaskRegistry<I, S> {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Register a task under its own name.
    ///
    /// Registering the same instance again is a no-op. Registering a
    /// *different* instance under an existing name is a programming error
    /// and panics.
    pub fn register(&mut self, task: Arc<dyn Task<I, S>>) {
        let name = task.name().to_string();
        if let Some(existing) = self.tasks.get(&name) {
            if Arc::ptr_eq(existing, &task) {
                return;
            }
            panic!("task '{name}' already registered with a different implementation");
        }
        self.tasks.insert(name, task);
    }

    /// Look a task up by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Task<I, S>>> {
        self.tasks.get(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
