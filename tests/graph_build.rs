use std::sync::Arc;

use async_trait::async_trait;
use rundag::{BuildError, Graph, RunContext, RunError, Task, TaskRegistry};

struct Noop(&'static str);

#[async_trait]
impl Task<(), ()> for Noop {
    fn name(&self) -> &str {
        self.0
    }

    async fn run(&self, _ctx: &RunContext, _input: &(), _state: &()) -> anyhow::Result<()> {
        Ok(())
    }
}

fn node(name: &'static str) -> Arc<Noop> {
    Arc::new(Noop(name))
}

#[test]
fn cycle_fails_at_build() {
    let mut graph: Graph<(), ()> = Graph::new("cyclic");
    graph
        .add_node(node("A"), false, &["B"])
        .add_node(node("B"), false, &["C"])
        .add_node(node("C"), false, &["A"]);

    let err = graph.build().err().expect("cycle must be rejected");
    assert!(matches!(err, BuildError::CycleDetected { .. }), "{err}");
}

#[test]
fn self_dependency_fails_at_build() {
    let mut graph: Graph<(), ()> = Graph::new("selfloop");
    graph.add_node(node("A"), false, &["A"]);

    let err = graph.build().err().expect("self-dependency must be rejected");
    assert!(matches!(err, BuildError::CycleDetected { .. }), "{err}");
}

#[test]
fn undeclared_dependency_fails_at_build() {
    let mut graph: Graph<(), ()> = Graph::new("dangling");
    graph.add_node(node("A"), false, &["ghost"]);

    let err = graph.build().err().expect("undeclared dep must be rejected");
    match err {
        BuildError::UndeclaredDependency {
            task, dependency, ..
        } => {
            assert_eq!(task, "A");
            assert_eq!(dependency, "ghost");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn diamond_dag_builds() {
    let mut graph: Graph<(), ()> = Graph::new("diamond");
    graph
        .add_node(node("A"), true, &[])
        .add_node(node("B"), false, &["A"])
        .add_node(node("C"), false, &["A"])
        .add_node(node("D"), false, &["B", "C"]);

    assert!(graph.build().is_ok());
}

#[test]
#[should_panic(expected = "already exists")]
fn duplicate_node_panics() {
    let mut graph: Graph<(), ()> = Graph::new("dup");
    graph.add_node(node("A"), false, &[]);
    graph.add_node(node("A"), true, &[]);
}

#[test]
#[should_panic(expected = "already built")]
fn add_node_after_build_panics() {
    let mut graph: Graph<(), ()> = Graph::new("frozen");
    graph.add_node(node("A"), false, &[]);
    graph.build().expect("valid graph");
    graph.add_node(node("B"), false, &[]);
}

#[test]
#[should_panic(expected = "already built")]
fn build_twice_panics() {
    let mut graph: Graph<(), ()> = Graph::new("rebuilt");
    graph.add_node(node("A"), false, &[]);
    graph.build().expect("valid graph");
    let _ = graph.build();
}

#[tokio::test]
async fn execute_before_build_returns_not_built() {
    let mut graph: Graph<(), ()> = Graph::new("unbuilt");
    graph.add_node(node("A"), false, &[]);

    let err = graph
        .execute(Arc::new(()), Arc::new(()))
        .await
        .err()
        .expect("executing an unbuilt graph must fail");
    assert!(matches!(err, RunError::NotBuilt { .. }), "{err}");
}

#[tokio::test]
async fn empty_graph_builds_and_executes() {
    let mut graph: Graph<(), ()> = Graph::new("empty");
    graph.build().expect("empty graph is valid");
    graph
        .execute(Arc::new(()), Arc::new(()))
        .await
        .expect("empty run should succeed");
}

#[test]
fn registry_ignores_reregistering_the_same_instance() {
    let mut registry: TaskRegistry<(), ()> = TaskRegistry::new();
    let task = node("A");
    registry.register(task.clone());
    registry.register(task);
    assert_eq!(registry.len(), 1);
}

#[test]
#[should_panic(expected = "different implementation")]
fn registry_rejects_same_name_different_instance() {
    let mut registry: TaskRegistry<(), ()> = TaskRegistry::new();
    registry.register(node("A"));
    registry.register(node("A"));
}
