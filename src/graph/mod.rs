// src/graph/mod.rs

//! Graph definition, validation, and the `execute` entry point.
//!
//! - [`builder`] holds the [`Graph`] type: declaration, build-time
//!   validation (undeclared dependencies, cycles), and per-request runs.
//! - [`registry`] maps task names to implementations for one graph.

pub mod builder;
pub mod registry;

pub use builder::Graph;
pub use registry::TaskRegistry;
