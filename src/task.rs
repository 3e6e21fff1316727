// src/task.rs

//! Task and packer traits, plus the per-run context handed to both.
//!
//! A [`Task`] is one named unit of work in the DAG. A [`Packer`] is an
//! ordered finalizer that runs once per successful run, after every node
//! has finished.
//!
//! Both traits are generic over:
//! - `I`: the per-run input, shared read-only across all tasks of a run
//! - `S`: the caller-supplied shared state
//!
//! Shared-state contract: the engine passes `&S` to every task of a run
//! concurrently and adds no locking of its own. Tasks that run in parallel
//! must confine their writes to disjoint interior-mutable regions of `S`.

use std::sync::Arc;

use async_trait::async_trait;

/// Public type alias for task names throughout the engine.
pub type TaskName = String;

/// Per-run identity passed to every task and packer.
///
/// Mainly useful for log correlation: the graph name and a monotonically
/// increasing run id identify one execution in interleaved log output.
#[derive(Debug, Clone)]
pub struct RunContext {
    graph: Arc<str>,
    run_id: u64,
}

impl RunContext {
    pub(crate) fn new(graph: Arc<str>, run_id: u64) -> Self {
        Self { graph, run_id }
    }

    /// Name of the graph this run belongs to.
    pub fn graph(&self) -> &str {
        &self.graph
    }

    /// Run id, unique per graph for the lifetime of the process.
    pub fn run_id(&self) -> u64 {
        self.run_id
    }
}

/// One named unit of work in the DAG.
///
/// `run` is invoked at most once per run, and only after every declared
/// predecessor has finished. Returning an error from a core task aborts the
/// whole run; an auxiliary task's error is logged and otherwise ignored.
#[async_trait]
pub trait Task<I: Sync, S: Sync>: Send + Sync {
    /// Unique name of this task within its graph.
    fn name(&self) -> &str;

    /// Decide whether this task should run at all for this input.
    ///
    /// Returning `false` skips the task and, transitively, every task
    /// downstream of it.
    async fn should_do(&self, ctx: &RunContext, input: &I, state: &S) -> bool {
        let _ = (ctx, input, state);
        true
    }

    /// Do the work. Writes go into `state` under the disjoint-write contract.
    async fn run(&self, ctx: &RunContext, input: &I, state: &S) -> anyhow::Result<()>;
}

/// An ordered post-processing stage.
///
/// Packers run sequentially in ascending priority order, once per run, and
/// only if no core task failed. The first packer error aborts the remaining
/// packers and becomes the run's result.
#[async_trait]
pub trait Packer<I, S>: Send + Sync {
    async fn pack(&self, ctx: &RunContext, input: &I, state: &S) -> anyhow::Result<()>;
}
