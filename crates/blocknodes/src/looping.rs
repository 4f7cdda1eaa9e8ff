use crate::config::{lenient_string, parse_config};
use async_trait::async_trait;
use blockcore::{block_types, BlockContext, BlockHandler, HandlerMetadata, StepResult};
use serde::Deserialize;

pub const LOOP_BRANCH: &str = "loop";
pub const EXIT_BRANCH: &str = "exit";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoopConfig {
    #[serde(alias = "count", deserialize_with = "lenient_string")]
    iterations: String,
    #[serde(rename = "countervariable", deserialize_with = "lenient_string")]
    counter_variable: String,
}

/// Repeat the `loop` branch a fixed number of times, then take `exit`.
///
/// The counter lives in the engine's per-run map, keyed by block id, and is
/// reset on exit so an enclosing loop can run this one again.
pub struct LoopHandler;

#[async_trait]
impl BlockHandler for LoopHandler {
    fn block_type(&self) -> &str {
        block_types::LOOP
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        let config: LoopConfig = parse_config(ctx);
        let iterations = ctx
            .store
            .resolve_number(&config.iterations)
            .map(|n| n.floor())
            .unwrap_or(0.0);

        let counter = ctx.loop_counters.entry(ctx.block.id).or_insert(0);

        if f64::from(*counter) < iterations {
            *counter += 1;
            let iteration = *counter;
            if !config.counter_variable.trim().is_empty() {
                ctx.store.set(&config.counter_variable, iteration.to_string());
            }
            StepResult::branch(
                LOOP_BRANCH,
                format!("Loop iteration {} of {}", iteration, iterations),
            )
        } else {
            let completed = std::mem::take(counter);
            StepResult::branch(
                EXIT_BRANCH,
                format!("Loop finished after {} iterations", completed),
            )
        }
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Repeat the 'loop' connection, then follow 'exit'", "control")
    }
}
