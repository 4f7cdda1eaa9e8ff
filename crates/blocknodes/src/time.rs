use crate::config::{lenient_string, parse_config};
use async_trait::async_trait;
use blockcore::{block_types, BlockContext, BlockHandler, HandlerMetadata, StepResult};
use serde::Deserialize;
use tokio::time::{sleep, Duration};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WaitConfig {
    #[serde(rename = "delayms", deserialize_with = "lenient_string")]
    delay_ms: String,
    #[serde(rename = "delayvariable", deserialize_with = "lenient_string")]
    delay_variable: String,
}

/// Pause the run for a configured number of milliseconds
pub struct WaitHandler {
    max_delay_ms: u64,
}

impl WaitHandler {
    pub fn new(max_delay_ms: u64) -> Self {
        Self { max_delay_ms }
    }

    /// A numeric `DelayVariable` wins over `DelayMs`; negatives become zero.
    fn requested_delay(config: &WaitConfig, ctx: &BlockContext<'_>) -> f64 {
        let from_variable = if config.delay_variable.trim().is_empty() {
            None
        } else {
            ctx.store
                .get(&config.delay_variable)
                .and_then(blockcore::parse_number)
        };

        from_variable
            .or_else(|| ctx.store.resolve_number(&config.delay_ms))
            .unwrap_or(0.0)
            .max(0.0)
    }
}

#[async_trait]
impl BlockHandler for WaitHandler {
    fn block_type(&self) -> &str {
        block_types::WAIT
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        let config: WaitConfig = parse_config(ctx);
        let requested = Self::requested_delay(&config, ctx);

        let delay_ms = if requested > self.max_delay_ms as f64 {
            ctx.events.warn(format!(
                "Wait '{}': {}ms exceeds the limit, clipped to {}ms",
                ctx.display_name(),
                requested,
                self.max_delay_ms
            ));
            self.max_delay_ms
        } else {
            requested as u64
        };

        ctx.events.info(format!("Waiting for {}ms", delay_ms));

        tokio::select! {
            _ = ctx.cancellation.cancelled() => {
                StepResult::error(format!("Wait of {}ms cancelled", delay_ms))
            }
            _ = sleep(Duration::from_millis(delay_ms)) => {
                StepResult::success(format!("Waited {}ms", delay_ms))
            }
        }
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Delay execution for specified milliseconds", "time")
    }
}
