//! Workflow execution runtime
//!
//! This crate provides the traversal engine that runs block workflows,
//! the handler registry it dispatches through, and the record builder.

mod executor;
mod graph;
mod recorder;
mod registry;
mod runtime;

pub use executor::WorkflowExecutor;
pub use graph::{select_connection, GraphIndex, ResolvedBlock};
pub use recorder::ExecutionRecorder;
pub use registry::HandlerRegistry;
pub use runtime::{FlowRuntime, RuntimeConfig, ValidationReport};
