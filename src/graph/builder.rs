// src/graph/builder.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::debug;

use crate::errors::{BuildError, RunError};
use crate::graph::registry::TaskRegistry;
use crate::run::instance::RunInstance;
use crate::task::{Packer, RunContext, Task, TaskName};

/// A post-processing stage together with its sort priority.
pub(crate) struct PackerComponent<I, S> {
    pub(crate) priority: i32,
    pub(crate) packer: Arc<dyn Packer<I, S>>,
}

/// Static, per-task information frozen at build time.
pub(crate) struct TaskMeta<I: Sync, S: Sync> {
    pub(crate) task: Arc<dyn Task<I, S>>,
    pub(crate) core: bool,
    /// Direct dependencies: tasks that must finish before this one starts.
    pub(crate) deps: Vec<TaskName>,
    /// Direct dependents: tasks whose barriers this one notifies on finish.
    pub(crate) dependents: Vec<TaskName>,
}

/// The immutable result of `Graph::build`, shared by every run.
pub(crate) struct Topology<I: Sync, S: Sync> {
    pub(crate) name: Arc<str>,
    pub(crate) tasks: HashMap<TaskName, TaskMeta<I, S>>,
    /// Packers, stable-sorted by ascending priority.
    pub(crate) packers: Vec<PackerComponent<I, S>>,
    pub(crate) log_task_cost: bool,
}

/// Declarative DAG of tasks plus ordered post-processing packers.
///
/// Lifecycle: declare nodes and packers, call [`Graph::build`] exactly once
/// (typically at process start), then call [`Graph::execute`] once per
/// incoming request. Runs are independent and may be issued concurrently.
///
/// Declaration mistakes fail fast: adding a duplicate node, or touching the
/// graph after `build`, panics. `build` itself reports undeclared
/// dependencies and cycles as [`BuildError`]s.
pub struct Graph<I: Sync, S: Sync> {
    name: Arc<str>,
    registry: TaskRegistry<I, S>,
    /// Task name → core flag.
    task_set: HashMap<TaskName, bool>,
    /// Task → set of tasks it depends on.
    dep_map: HashMap<TaskName, HashSet<TaskName>>,
    /// Task → set of tasks depending on it.
    reverse_dep_map: HashMap<TaskName, HashSet<TaskName>>,
    packers: Vec<PackerComponent<I, S>>,
    log_task_cost: bool,

    run_counter: AtomicU64,
    topology: Option<Arc<Topology<I, S>>>,
}

impl<I, S> Graph<I, S>
where
    I: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    /// Create an empty, unbuilt graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            registry: TaskRegistry::new(),
            task_set: HashMap::new(),
            dep_map: HashMap::new(),
            reverse_dep_map: HashMap::new(),
            packers: Vec::new(),
            log_task_cost: false,
            run_counter: AtomicU64::new(0),
            topology: None,
        }
    }

    /// Name this graph was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a task, its core flag, and the names of the tasks it depends
    /// on. Dependencies must themselves be declared (in any order) before
    /// `build`.
    ///
    /// # Panics
    /// If the graph is already built, or a task with this name was already
    /// declared.
    pub fn add_node(
        &mut self,
        task: Arc<dyn Task<I, S>>,
        is_core: bool,
        depends_on: &[&str],
    ) -> &mut Self {
        self.assert_unbuilt();

        let name = task.name().to_string();
        if self.task_set.contains_key(&name) {
            panic!("graph '{}': node '{name}' already exists", self.name);
        }

        self.registry.register(task);

        for dep in depends_on {
            self.add_dep(&name, dep);
        }

        self.task_set.insert(name, is_core);
        self
    }

    /// Declare a post-processing packer. Lower priorities run first; equal
    /// priorities keep insertion order.
    ///
    /// # Panics
    /// If the graph is already built.
    pub fn add_packer(&mut self, priority: i32, packer: Arc<dyn Packer<I, S>>) -> &mut Self {
        self.assert_unbuilt();
        self.packers.push(PackerComponent { priority, packer });
        self
    }

    /// Log each task's wall-clock duration at info level during runs.
    ///
    /// # Panics
    /// If the graph is already built.
    pub fn log_task_cost(&mut self) -> &mut Self {
        self.assert_unbuilt();
        self.log_task_cost = true;
        self
    }

    /// Validate and freeze the graph.
    ///
    /// Checks that every referenced dependency is declared and that the
    /// dependency relation is acyclic, then freezes the topology. After a
    /// successful `build` the graph is immutable and ready for `execute`.
    ///
    /// # Panics
    /// If called twice.
    pub fn build(&mut self) -> Result<&mut Self, BuildError> {
        self.assert_unbuilt();

        // Stable sort keeps insertion order among equal priorities.
        self.packers.sort_by_key(|p| p.priority);

        self.check_declared()?;
        self.check_acyclic()?;

        let tasks = self
            .task_set
            .iter()
            .map(|(name, &core)| {
                let task = self
                    .registry
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| panic!("task '{name}' declared but not registered"));
                let deps = collect_edges(&self.dep_map, name);
                let dependents = collect_edges(&self.reverse_dep_map, name);
                (
                    name.clone(),
                    TaskMeta {
                        task,
                        core,
                        deps,
                        dependents,
                    },
                )
            })
            .collect();

        self.topology = Some(Arc::new(Topology {
            name: Arc::clone(&self.name),
            tasks,
            packers: std::mem::take(&mut self.packers),
            log_task_cost: self.log_task_cost,
        }));

        debug!(graph = %self.name, tasks = self.task_set.len(), "graph built");
        Ok(self)
    }

    /// Run the graph once against one input and one shared state.
    ///
    /// All tasks with satisfied dependencies run in parallel on the tokio
    /// runtime. Returns the first core failure, the first packer failure,
    /// or `Ok(())`.
    pub async fn execute(&self, input: Arc<I>, state: Arc<S>) -> Result<(), RunError> {
        let Some(topology) = &self.topology else {
            return Err(RunError::NotBuilt {
                graph: self.name.to_string(),
            });
        };

        let run_id = self.run_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let ctx = RunContext::new(Arc::clone(&self.name), run_id);

        let started = Instant::now();
        let (instance, done_rx) = RunInstance::plan(Arc::clone(topology));
        let result = instance.execute(ctx, input, state, done_rx).await;

        debug!(
            graph = %self.name,
            run_id,
            cost_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "graph run finished"
        );

        result
    }

    fn assert_unbuilt(&self) {
        if self.topology.is_some() {
            panic!("graph '{}' is already built", self.name);
        }
    }

    /// Record `task` → depends on → `dep`, and the inverse edge.
    fn add_dep(&mut self, task: &str, dep: &str) {
        self.dep_map
            .entry(task.to_string())
            .or_default()
            .insert(dep.to_string());
        self.reverse_dep_map
            .entry(dep.to_string())
            .or_default()
            .insert(task.to_string());
    }

    fn check_declared(&self) -> Result<(), BuildError> {
        for (task, deps) in &self.dep_map {
            for dep in deps {
                if !self.task_set.contains_key(dep) {
                    return Err(BuildError::UndeclaredDependency {
                        graph: self.name.to_string(),
                        task: task.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Cycle detection: exhaustive DFS from every node with outgoing
    /// dependency edges, carrying a fresh copy of the visited set down each
    /// path. Deliberately path-sensitive rather than memoised; the cost
    /// grows with path count, which is fine for the tens-of-nodes graphs
    /// this engine targets.
    fn check_acyclic(&self) -> Result<(), BuildError> {
        let empty = HashSet::new();
        for name in self.dep_map.keys() {
            self.dfs(name, &empty)?;
        }
        Ok(())
    }

    fn dfs<'a>(&'a self, name: &'a str, visited: &HashSet<&'a str>) -> Result<(), BuildError> {
        if visited.contains(name) {
            return Err(BuildError::CycleDetected {
                graph: self.name.to_string(),
                task: name.to_string(),
            });
        }
        let Some(deps) = self.dep_map.get(name) else {
            return Ok(());
        };
        for next in deps {
            let mut path = visited.clone();
            path.insert(name);
            self.dfs(next, &path)?;
        }
        Ok(())
    }
}

fn collect_edges(map: &HashMap<TaskName, HashSet<TaskName>>, name: &str) -> Vec<TaskName> {
    map.get(name)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default()
}
