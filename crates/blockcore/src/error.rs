use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised inside a block handler.
///
/// These never leave the handler: they are folded into an error
/// [`StepResult`](crate::StepResult) so the run can follow its `Error` edge.
#[derive(Error, Debug, Clone)]
pub enum HandlerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Cancelled")]
    Cancelled,
}

/// Structural problems that prevent a workflow from being traversed at all.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Workflow has no Start block")]
    NoStartBlock,

    #[error("Workflow has {count} Start blocks, expected exactly one")]
    MultipleStartBlocks { count: usize },

    #[error("Block '{block}' references unknown system block {system_block_id}")]
    UnknownSystemBlock {
        block: String,
        system_block_id: String,
    },

    #[error("No handler registered for block type: {0}")]
    NoHandler(String),

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),
}
