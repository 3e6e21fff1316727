use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rundag::{Graph, Packer, RunContext, RunError, Task};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

struct Noop(&'static str);

#[async_trait]
impl Task<(), Recorder> for Noop {
    fn name(&self) -> &str {
        self.0
    }

    async fn run(&self, _ctx: &RunContext, _input: &(), _state: &Recorder) -> anyhow::Result<()> {
        Ok(())
    }
}

struct MarkPack {
    label: &'static str,
    fail: bool,
}

#[async_trait]
impl Packer<(), Recorder> for MarkPack {
    async fn pack(&self, _ctx: &RunContext, _input: &(), state: &Recorder) -> anyhow::Result<()> {
        state.push(self.label);
        if self.fail {
            anyhow::bail!("packer {} refused", self.label);
        }
        Ok(())
    }
}

fn pack(label: &'static str) -> Arc<MarkPack> {
    Arc::new(MarkPack { label, fail: false })
}

fn failing_pack(label: &'static str) -> Arc<MarkPack> {
    Arc::new(MarkPack { label, fail: true })
}

#[tokio::test]
async fn packers_run_in_ascending_priority_order() {
    let mut graph = Graph::new("packer-order");
    graph
        .add_node(Arc::new(Noop("A")), false, &[])
        .add_packer(10, pack("third"))
        .add_packer(-1, pack("first"))
        .add_packer(5, pack("second"));
    graph.build().expect("valid graph");

    let state = Arc::new(Recorder::default());
    graph
        .execute(Arc::new(()), state.clone())
        .await
        .expect("run should succeed");

    assert_eq!(state.events(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn equal_priority_packers_keep_insertion_order() {
    let mut graph = Graph::new("packer-ties");
    graph
        .add_node(Arc::new(Noop("A")), false, &[])
        .add_packer(1, pack("tie-a"))
        .add_packer(0, pack("early"))
        .add_packer(1, pack("tie-b"));
    graph.build().expect("valid graph");

    let state = Arc::new(Recorder::default());
    graph
        .execute(Arc::new(()), state.clone())
        .await
        .expect("run should succeed");

    assert_eq!(state.events(), vec!["early", "tie-a", "tie-b"]);
}

#[tokio::test]
async fn failing_packer_aborts_the_remaining_packers() {
    let mut graph = Graph::new("packer-fail");
    graph
        .add_node(Arc::new(Noop("A")), false, &[])
        .add_packer(0, failing_pack("broken"))
        .add_packer(1, pack("never"));
    graph.build().expect("valid graph");

    let state = Arc::new(Recorder::default());
    let err = graph
        .execute(Arc::new(()), state.clone())
        .await
        .err()
        .expect("packer failure must surface");

    match &err {
        RunError::PackerFailed { priority, .. } => assert_eq!(*priority, 0),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(state.events(), vec!["broken"]);
}

#[tokio::test]
async fn packers_run_even_when_the_graph_has_no_tasks() {
    let mut graph: Graph<(), Recorder> = Graph::new("packer-only");
    graph.add_packer(0, pack("lonely"));
    graph.build().expect("valid graph");

    let state = Arc::new(Recorder::default());
    graph
        .execute(Arc::new(()), state.clone())
        .await
        .expect("run should succeed");

    assert_eq!(state.events(), vec!["lonely"]);
}
