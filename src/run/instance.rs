// src/run/instance.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::warn;

use crate::barrier::Barrier;
use crate::errors::RunError;
use crate::graph::builder::Topology;
use crate::run::node::{self, TaskFailure};
use crate::task::{RunContext, TaskName};

/// Per-task, per-run mutable state.
pub(crate) struct NodeState {
    pub(crate) core: bool,
    /// Set when this task was skipped (own `should_do` said no, or an
    /// ancestor was skipped). Read by dependents to propagate the skip.
    pub(crate) skip: AtomicBool,
    /// Present iff the task has predecessors; sized to their count.
    pub(crate) barrier: Option<Barrier>,
}

/// One execution of a graph: `Planning → Running → {Completed | Aborted}`.
///
/// Holds one [`NodeState`] per task, the outstanding-node counter, the
/// abort flag, and the completion channel. Shared via `Arc` with every node
/// runner of the run; a fresh instance is planned per `execute` call and
/// never crosses runs.
pub(crate) struct RunInstance<I: Sync, S: Sync> {
    pub(crate) topology: Arc<Topology<I, S>>,
    pub(crate) nodes: HashMap<TaskName, NodeState>,
    /// Nodes that have not yet finished their runner.
    outstanding: AtomicUsize,
    /// Set by the first core failure; advisory for runners still in flight.
    aborted: AtomicBool,
    /// The failure that won the abort race.
    failure: Mutex<Option<RunError>>,
    /// Completion signal. Capacity 2: the counter reaching zero and an
    /// early abort may both emit, and neither must ever block.
    done_tx: mpsc::Sender<()>,
}

impl<I, S> RunInstance<I, S>
where
    I: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    /// Planning phase: one node state per task, with a barrier sized to the
    /// predecessor count for tasks that have any.
    pub(crate) fn plan(topology: Arc<Topology<I, S>>) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (done_tx, done_rx) = mpsc::channel(2);

        let nodes = topology
            .tasks
            .iter()
            .map(|(name, meta)| {
                let barrier = if meta.deps.is_empty() {
                    None
                } else {
                    Some(Barrier::new(meta.deps.len() as u32))
                };
                (
                    name.clone(),
                    NodeState {
                        core: meta.core,
                        skip: AtomicBool::new(false),
                        barrier,
                    },
                )
            })
            .collect::<HashMap<_, _>>();

        let outstanding = AtomicUsize::new(nodes.len());

        (
            Arc::new(Self {
                topology,
                nodes,
                outstanding,
                aborted: AtomicBool::new(false),
                failure: Mutex::new(None),
                done_tx,
            }),
            done_rx,
        )
    }

    /// Running phase: spawn one runner per node, then park until either the
    /// outstanding counter hits zero or a core failure aborts the run.
    pub(crate) async fn execute(
        self: Arc<Self>,
        ctx: RunContext,
        input: Arc<I>,
        state: Arc<S>,
        mut done_rx: mpsc::Receiver<()>,
    ) -> Result<(), RunError> {
        let ctx = Arc::new(ctx);

        if !self.nodes.is_empty() {
            for name in self.nodes.keys() {
                tokio::spawn(node::run_node(
                    Arc::clone(&self),
                    name.clone(),
                    Arc::clone(&ctx),
                    Arc::clone(&input),
                    Arc::clone(&state),
                ));
            }

            // A sender lives in `self`, so this always yields a token.
            let _ = done_rx.recv().await;
        }

        if self.is_aborted() {
            // Unblock every runner still parked on its barrier; each will
            // observe the abort flag and exit without doing further work.
            for node in self.nodes.values() {
                if let Some(barrier) = &node.barrier {
                    barrier.force_release();
                }
            }
            return Err(self.take_failure());
        }

        // Completed: ordered post-processing, first error wins.
        for component in &self.topology.packers {
            if let Err(source) = component.packer.pack(&ctx, &input, &state).await {
                return Err(RunError::PackerFailed {
                    priority: component.priority,
                    source,
                });
            }
        }

        Ok(())
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// First core failure wins the abort race: it records its error and
    /// emits the completion signal early. Losers are logged and discarded.
    ///
    /// The failure slot is the arbiter, and the abort flag is only raised
    /// after the slot is written, so a waker observing the flag always
    /// finds the error.
    pub(crate) fn record_core_failure(&self, ctx: &RunContext, task: &str, failure: TaskFailure) {
        let err = failure.into_run_error(task);

        let mut slot = self.failure_slot();
        if slot.is_some() {
            drop(slot);
            warn!(
                graph = %ctx.graph(),
                run_id = ctx.run_id(),
                task,
                error = %err,
                "additional core failure after abort; discarding"
            );
            return;
        }

        warn!(
            graph = %ctx.graph(),
            run_id = ctx.run_id(),
            task,
            error = %err,
            "core task failed; aborting run"
        );
        *slot = Some(err);
        self.aborted.store(true, Ordering::Release);
        drop(slot);

        let _ = self.done_tx.try_send(());
    }

    /// Called once per node runner, whatever the outcome. Emits the
    /// completion signal when the last node finishes.
    pub(crate) fn node_finished(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _ = self.done_tx.try_send(());
        }
    }

    fn take_failure(&self) -> RunError {
        self.failure_slot().take().unwrap_or_else(|| {
            // The abort flag is only ever set together with a failure.
            RunError::CoreTaskFailed {
                task: String::new(),
                source: anyhow::anyhow!("run aborted without a recorded failure"),
            }
        })
    }

    fn failure_slot(&self) -> std::sync::MutexGuard<'_, Option<RunError>> {
        match self.failure.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
