// src/lib.rs

//! `rundag` — an in-process concurrent task orchestrator.
//!
//! Callers declare named tasks with explicit dependency edges, mark some as
//! core (a core failure aborts the whole run), build the resulting DAG
//! once, and then execute it once per incoming request. All tasks with
//! satisfied dependencies run in parallel on the tokio runtime; ordering is
//! enforced with per-run counting barriers rather than a central scheduler
//! loop.
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use rundag::{Graph, RunContext, Task};
//!
//! struct Fetch;
//!
//! #[async_trait]
//! impl Task<u64, ()> for Fetch {
//!     fn name(&self) -> &str {
//!         "fetch"
//!     }
//!     async fn run(&self, _ctx: &RunContext, id: &u64, _state: &()) -> anyhow::Result<()> {
//!         println!("fetching {id}");
//!         Ok(())
//!     }
//! }
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut graph = Graph::new("request");
//! graph.add_node(Arc::new(Fetch), true, &[]);
//! graph.build()?;
//! graph.execute(Arc::new(42), Arc::new(())).await?;
//! # Ok(())
//! # }
//! ```

pub mod barrier;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod task;

mod run;

pub use barrier::Barrier;
pub use errors::{BuildError, RunError};
pub use graph::{Graph, TaskRegistry};
pub use task::{Packer, RunContext, Task, TaskName};
