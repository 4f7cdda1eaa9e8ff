use blockcore::{BlockHandler, HandlerMetadata, SystemBlock, WorkflowError};
use std::sync::Arc;

/// Ordered registry of block handlers.
///
/// Lookup walks the handlers in registration order and the first one whose
/// `can_handle` matches wins. The fallback, when configured, is consulted
/// last and accepts any block type.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn BlockHandler>>,
    fallback: Option<Arc<dyn BlockHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            fallback: None,
        }
    }

    /// Register a handler
    pub fn register(&mut self, handler: Arc<dyn BlockHandler>) {
        tracing::info!("Registering block handler: {}", handler.block_type());
        self.handlers.push(handler);
    }

    /// Set the handler used for block types nothing else claims
    pub fn set_fallback(&mut self, handler: Arc<dyn BlockHandler>) {
        tracing::info!("Registering fallback handler: {}", handler.block_type());
        self.fallback = Some(handler);
    }

    /// Find the handler for a system block type
    pub fn resolve(&self, system_block: &SystemBlock) -> Result<&Arc<dyn BlockHandler>, WorkflowError> {
        self.handlers
            .iter()
            .find(|h| h.can_handle(system_block))
            .or(self.fallback.as_ref())
            .ok_or_else(|| WorkflowError::NoHandler(system_block.block_type.clone()))
    }

    /// Get all registered block types, fallback excluded
    pub fn list_block_types(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.block_type().to_string()).collect()
    }

    /// Get metadata for a block type
    pub fn get_metadata(&self, block_type: &str) -> Option<HandlerMetadata> {
        self.handlers
            .iter()
            .find(|h| h.block_type().eq_ignore_ascii_case(block_type))
            .map(|h| h.metadata())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
