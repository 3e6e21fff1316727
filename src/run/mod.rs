// src/run/mod.rs

//! Per-run execution.
//!
//! - [`instance`] holds the run-instance state machine: planning node
//!   states and barriers, awaiting the completion signal, aborting on core
//!   failure, and running packers on success.
//! - [`node`] is the per-task execution path: barrier wait, skip
//!   propagation, invocation with panic recovery, dependent notification.

pub(crate) mod instance;
pub(crate) mod node;
