use crate::config::{lenient_string, parse_config};
use async_trait::async_trait;
use blockcore::{block_types, BlockContext, BlockHandler, HandlerMetadata, StepResult};
use serde::Deserialize;

/// Label of the connection taken when no case matches
pub const DEFAULT_CASE: &str = "default";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SwitchConfig {
    #[serde(alias = "variable", deserialize_with = "lenient_string")]
    expression: String,
}

/// Branch on the value of an expression, matched against connection labels
pub struct SwitchHandler;

#[async_trait]
impl BlockHandler for SwitchHandler {
    fn block_type(&self) -> &str {
        block_types::SWITCH
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        let config: SwitchConfig = parse_config(ctx);
        let value = ctx.store.resolve(&config.expression);

        if !value.trim().is_empty() && ctx.has_branch(&value) {
            let description = format!("Switch on '{}': case '{}'", config.expression, value);
            StepResult::branch(value, description)
        } else {
            StepResult::branch(
                DEFAULT_CASE,
                format!("Switch on '{}': no case for '{}', using default", config.expression, value),
            )
        }
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Follow the connection labeled with the expression's value", "control")
    }
}
