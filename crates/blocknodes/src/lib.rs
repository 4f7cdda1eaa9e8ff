//! Standard block library
//!
//! Handlers for the eleven built-in block types plus a passthrough fallback

mod calculation;
mod condition;
mod config;
mod control;
mod http;
mod looping;
mod parser;
mod switch;
mod time;
mod transform;

pub use calculation::CalculationHandler;
pub use condition::ConditionHandler;
pub use control::{EndHandler, PassthroughHandler, StartHandler};
pub use http::{HttpRequestHandler, BODY_VARIABLE, STATUS_VARIABLE};
pub use looping::{LoopHandler, EXIT_BRANCH, LOOP_BRANCH};
pub use parser::ParserHandler;
pub use switch::{SwitchHandler, DEFAULT_CASE};
pub use time::WaitHandler;
pub use transform::{TextReplaceHandler, TextTransformHandler};

use blockruntime::HandlerRegistry;
use std::sync::Arc;

/// Resource limits applied by the standard handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerLimits {
    /// Longest delay a Wait block may request
    pub max_wait_ms: u64,
    /// Default and upper bound for HttpRequest timeouts
    pub http_timeout_ms: u64,
    /// Compiled size limit for TextReplace regexes
    pub regex_size_limit: usize,
    pub max_regex_pattern_len: usize,
}

impl Default for HandlerLimits {
    fn default() -> Self {
        Self {
            max_wait_ms: 60_000,
            http_timeout_ms: 30_000,
            regex_size_limit: 1 << 20,
            max_regex_pattern_len: 1000,
        }
    }
}

/// Register all standard handlers with default limits
pub fn register_all(registry: &mut HandlerRegistry) {
    register_with_limits(registry, &HandlerLimits::default());
}

/// Register all standard handlers, with the passthrough as fallback
pub fn register_with_limits(registry: &mut HandlerRegistry, limits: &HandlerLimits) {
    registry.register(Arc::new(StartHandler));
    registry.register(Arc::new(EndHandler));
    registry.register(Arc::new(CalculationHandler));
    registry.register(Arc::new(ConditionHandler));
    registry.register(Arc::new(SwitchHandler));
    registry.register(Arc::new(LoopHandler));
    registry.register(Arc::new(WaitHandler::new(limits.max_wait_ms)));
    registry.register(Arc::new(TextTransformHandler));
    registry.register(Arc::new(TextReplaceHandler::new(
        limits.regex_size_limit,
        limits.max_regex_pattern_len,
    )));
    registry.register(Arc::new(ParserHandler));
    registry.register(Arc::new(HttpRequestHandler::new(limits.http_timeout_ms)));
    registry.set_fallback(Arc::new(PassthroughHandler));
}
