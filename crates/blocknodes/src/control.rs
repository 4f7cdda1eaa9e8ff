use async_trait::async_trait;
use blockcore::{block_types, BlockContext, BlockHandler, HandlerMetadata, StepResult, SystemBlock};

/// Workflow entry point
pub struct StartHandler;

#[async_trait]
impl BlockHandler for StartHandler {
    fn block_type(&self) -> &str {
        block_types::START
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        StepResult::success(format!("Started: {}", ctx.display_name()))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Workflow entry point", "control")
    }
}

/// Workflow terminus; the engine stops after visiting it
pub struct EndHandler;

#[async_trait]
impl BlockHandler for EndHandler {
    fn block_type(&self) -> &str {
        block_types::END
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        StepResult::success(format!("Finished: {}", ctx.display_name()))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Workflow terminus", "control")
    }
}

/// No-op for block types without a dedicated handler.
///
/// Registered as the registry fallback so unknown system block types still
/// run and show up in the action log.
pub struct PassthroughHandler;

#[async_trait]
impl BlockHandler for PassthroughHandler {
    fn block_type(&self) -> &str {
        "Default"
    }

    fn can_handle(&self, _system_block: &SystemBlock) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        StepResult::success(ctx.display_name().to_string())
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Passes through blocks of unrecognized types", "control")
    }
}
