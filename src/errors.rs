// src/errors.rs

//! Structured error types for graph construction and execution.
//!
//! Build-time problems are static configuration mistakes and should abort
//! process initialisation: the recoverable ones ([`BuildError`]) come back
//! from `Graph::build`, while duplicate declarations and mutation after
//! build panic at the call site.

use thiserror::Error;

/// Errors surfaced by `Graph::build`.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A task lists a dependency that was never declared with `add_node`.
    #[error("graph '{graph}': dependency '{dependency}' of task '{task}' not declared")]
    UndeclaredDependency {
        graph: String,
        task: String,
        dependency: String,
    },

    /// The dependency relation contains a cycle.
    #[error("graph '{graph}': cycle detected through task '{task}'")]
    CycleDetected { graph: String, task: String },
}

/// Errors surfaced by `Graph::execute`.
#[derive(Debug, Error)]
pub enum RunError {
    /// `execute` was called before `build`.
    #[error("graph '{graph}' has not been built")]
    NotBuilt { graph: String },

    /// A core task returned an error; the run was aborted.
    #[error("core task '{task}' failed: {source}")]
    CoreTaskFailed {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    /// A core task panicked; the run was aborted.
    #[error("core task '{task}' panicked: {message}")]
    CoreTaskPanicked { task: String, message: String },

    /// A post-processing packer failed; the remaining packers were skipped.
    #[error("packer (priority {priority}) failed: {source}")]
    PackerFailed {
        priority: i32,
        #[source]
        source: anyhow::Error,
    },
}

impl RunError {
    /// Name of the task this error originated from, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            RunError::CoreTaskFailed { task, .. } | RunError::CoreTaskPanicked { task, .. } => {
                Some(task)
            }
            RunError::NotBuilt { .. } | RunError::PackerFailed { .. } => None,
        }
    }
}
