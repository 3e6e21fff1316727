// src/run/node.rs

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::errors::RunError;
use crate::run::instance::RunInstance;
use crate::task::{RunContext, TaskName};

/// How one task invocation went wrong: a returned error, or a recovered
/// panic. Core tasks escalate either into a run abort; auxiliary tasks get
/// theirs logged and dropped.
pub(crate) enum TaskFailure {
    Error(anyhow::Error),
    Panic(String),
}

impl TaskFailure {
    pub(crate) fn into_run_error(self, task: &str) -> RunError {
        match self {
            TaskFailure::Error(source) => RunError::CoreTaskFailed {
                task: task.to_string(),
                source,
            },
            TaskFailure::Panic(message) => RunError::CoreTaskPanicked {
                task: task.to_string(),
                message,
            },
        }
    }
}

/// The per-task execution path, spawned once per node per run.
///
/// Whatever happens inside `drive` — success, skip, failure, panic — the
/// runner always notifies every dependent's barrier and decrements the
/// outstanding counter, so downstream nodes and the run's completion signal
/// never hang on this node.
pub(crate) async fn run_node<I, S>(
    run: Arc<RunInstance<I, S>>,
    name: TaskName,
    ctx: Arc<RunContext>,
    input: Arc<I>,
    state: Arc<S>,
) where
    I: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    if let Err(failure) = drive(&run, &name, &ctx, &input, &state).await {
        let core = run.nodes.get(&name).is_some_and(|n| n.core);
        if core {
            run.record_core_failure(&ctx, &name, failure);
        } else {
            let err = failure.into_run_error(&name);
            warn!(
                graph = %ctx.graph(),
                run_id = ctx.run_id(),
                task = %name,
                error = %err,
                "auxiliary task failed; run continues"
            );
        }
    }

    if let Some(meta) = run.topology.tasks.get(&name) {
        for dependent in &meta.dependents {
            if let Some(node) = run.nodes.get(dependent)
                && let Some(barrier) = &node.barrier
            {
                barrier.notify();
            }
        }
    }

    run.node_finished();
}

/// Wait on predecessors, evaluate skip logic, and invoke the task with
/// panic recovery.
async fn drive<I, S>(
    run: &RunInstance<I, S>,
    name: &str,
    ctx: &RunContext,
    input: &I,
    state: &S,
) -> Result<(), TaskFailure>
where
    I: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    if run.is_aborted() {
        return Ok(());
    }

    let (Some(node), Some(meta)) = (run.nodes.get(name), run.topology.tasks.get(name)) else {
        // Planning creates both entries for every declared task.
        warn!(graph = %ctx.graph(), task = %name, "node missing from run state");
        return Ok(());
    };

    if let Some(barrier) = &node.barrier {
        debug!(graph = %ctx.graph(), task = %name, "waiting on predecessors");
        barrier.wait().await;
    }

    // A force-released barrier wakes us mid-abort; do no further work.
    if run.is_aborted() {
        return Ok(());
    }

    if ancestor_skipped(run, name) {
        node.skip.store(true, Ordering::Release);
        debug!(graph = %ctx.graph(), task = %name, "skipped: upstream task was skipped");
        return Ok(());
    }

    match AssertUnwindSafe(meta.task.should_do(ctx, input, state))
        .catch_unwind()
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            node.skip.store(true, Ordering::Release);
            debug!(graph = %ctx.graph(), task = %name, "skipped: should_do returned false");
            return Ok(());
        }
        Err(payload) => {
            node.skip.store(true, Ordering::Release);
            return Err(TaskFailure::Panic(panic_message(payload)));
        }
    }

    debug!(graph = %ctx.graph(), task = %name, "executing");
    let started = Instant::now();

    let result = AssertUnwindSafe(meta.task.run(ctx, input, state))
        .catch_unwind()
        .await;

    if run.topology.log_task_cost {
        info!(
            graph = %ctx.graph(),
            run_id = ctx.run_id(),
            task = %name,
            cost_ms = started.elapsed().as_millis() as u64,
            ok = matches!(result, Ok(Ok(()))),
            "task finished"
        );
    }

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(TaskFailure::Error(err)),
        Err(payload) => Err(TaskFailure::Panic(panic_message(payload))),
    }
}

/// Recursively check whether any ancestor, direct or transitive, has its
/// skip flag set.
///
/// Safe to read without further synchronisation: a predecessor's flag is
/// settled before it notifies this node's barrier.
fn ancestor_skipped<I: Sync, S: Sync>(run: &RunInstance<I, S>, name: &str) -> bool {
    let Some(meta) = run.topology.tasks.get(name) else {
        return false;
    };
    for parent in &meta.deps {
        if let Some(node) = run.nodes.get(parent)
            && node.skip.load(Ordering::Acquire)
        {
            return true;
        }
        if ancestor_skipped(run, parent) {
            return true;
        }
    }
    false
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
