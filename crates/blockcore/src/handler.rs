use crate::{events::EventEmitter, Block, BlockConnection, BlockId, StepResult, SystemBlock, VariableStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Core trait that every block handler implements
#[async_trait]
pub trait BlockHandler: Send + Sync {
    /// Block type this handler serves (e.g. "Calculation", "HttpRequest")
    fn block_type(&self) -> &str;

    /// Whether this handler applies to a block of the given system type
    fn can_handle(&self, system_block: &SystemBlock) -> bool {
        system_block.is_type(self.block_type())
    }

    /// Execute one block. Failures are reported through the returned
    /// [`StepResult`], never propagated.
    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult;

    /// Optional: Describe the handler for listings
    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::default()
    }
}

/// Metadata about a handler
#[derive(Debug, Clone)]
pub struct HandlerMetadata {
    pub description: String,
    pub category: String,
}

impl Default for HandlerMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

impl HandlerMetadata {
    pub fn new(description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            category: category.into(),
        }
    }
}

/// Execution context passed to a handler for one step
pub struct BlockContext<'a> {
    /// Block being executed
    pub block: &'a Block,

    /// Catalog entry the block is typed by
    pub system_block: &'a SystemBlock,

    /// Run-scoped variables
    pub store: &'a mut VariableStore,

    /// Per-run loop counters keyed by block id
    pub loop_counters: &'a mut HashMap<BlockId, u32>,

    /// Outgoing connections of the block, in declaration order
    pub outgoing: &'a [&'a BlockConnection],

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Caller-supplied cancellation for suspending handlers
    pub cancellation: CancellationToken,
}

impl BlockContext<'_> {
    /// Raw json config, treating blank text as absent
    pub fn raw_config(&self) -> Option<&str> {
        self.block
            .json_config
            .as_deref()
            .filter(|c| !c.trim().is_empty())
    }

    /// Whether any outgoing connection carries the given label
    pub fn has_branch(&self, key: &str) -> bool {
        self.outgoing.iter().any(|c| c.matches_label(key))
    }

    /// Name to use in action descriptions
    pub fn display_name(&self) -> &str {
        if self.block.name.trim().is_empty() {
            &self.system_block.description
        } else {
            &self.block.name
        }
    }
}
