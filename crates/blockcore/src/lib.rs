//! Core abstractions for the block workflow engine
//!
//! This crate provides the graph model, the run-scoped variable store and
//! the handler contract that the runtime and the standard handlers build on.

mod error;
pub mod events;
mod handler;
mod record;
pub mod schedule;
mod step;
mod store;
mod workflow;

pub use error::{FlowError, HandlerError, WorkflowError};
pub use events::*;
pub use handler::{BlockContext, BlockHandler, HandlerMetadata};
pub use record::{ExecutionId, ExecutionOutcome, WorkflowExecution};
pub use schedule::{Schedule, TriggerType};
pub use step::{Branch, StepResult};
pub use store::{format_number, parse_number, variable_name, VariableStore, VARIABLE_SIGIL};
pub use workflow::{
    block_types, Block, BlockConnection, BlockId, ConnectionId, ConnectionType, SystemBlock,
    SystemBlockCatalog, SystemBlockId, Workflow, WorkflowId, WorkflowVariable,
};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
