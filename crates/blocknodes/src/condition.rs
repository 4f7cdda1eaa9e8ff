use crate::config::{lenient_string, parse_config};
use async_trait::async_trait;
use blockcore::{block_types, parse_number, BlockContext, BlockHandler, HandlerMetadata, StepResult};
use serde::Deserialize;
use std::cmp::Ordering;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConditionConfig {
    #[serde(deserialize_with = "lenient_string")]
    first: String,
    #[serde(deserialize_with = "lenient_string")]
    second: String,
    #[serde(rename = "datatype", deserialize_with = "lenient_string")]
    data_type: String,
    #[serde(alias = "comparison", alias = "condition", deserialize_with = "lenient_string")]
    operator: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Equals,
    NotEquals,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Contains,
    StartsWith,
    EndsWith,
}

impl Comparison {
    /// Missing operator means equality.
    fn parse(name: &str) -> Option<Self> {
        let comparison = match name.trim().to_ascii_lowercase().as_str() {
            "" | "equals" | "equal" | "eq" | "==" | "=" => Comparison::Equals,
            "notequals" | "notequal" | "ne" | "!=" | "<>" => Comparison::NotEquals,
            "greater" | "greaterthan" | "gt" | ">" => Comparison::Greater,
            "greaterorequal" | "greaterthanorequal" | "gte" | "ge" | ">=" => Comparison::GreaterOrEqual,
            "less" | "lessthan" | "lt" | "<" => Comparison::Less,
            "lessorequal" | "lessthanorequal" | "lte" | "le" | "<=" => Comparison::LessOrEqual,
            "contains" => Comparison::Contains,
            "startswith" => Comparison::StartsWith,
            "endswith" => Comparison::EndsWith,
            _ => return None,
        };
        Some(comparison)
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equals => "==",
            Comparison::NotEquals => "!=",
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Contains => "contains",
            Comparison::StartsWith => "starts with",
            Comparison::EndsWith => "ends with",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Comparison::Equals => ordering == Ordering::Equal,
            Comparison::NotEquals => ordering != Ordering::Equal,
            Comparison::Greater => ordering == Ordering::Greater,
            Comparison::GreaterOrEqual => ordering != Ordering::Less,
            Comparison::Less => ordering == Ordering::Less,
            Comparison::LessOrEqual => ordering != Ordering::Greater,
            Comparison::Contains | Comparison::StartsWith | Comparison::EndsWith => false,
        }
    }
}

/// Evaluate the comparison; `Err` carries why it could not be evaluated.
fn evaluate(comparison: Comparison, numeric: bool, first: &str, second: &str) -> Result<bool, String> {
    match comparison {
        Comparison::Contains => return Ok(first.contains(second)),
        Comparison::StartsWith => return Ok(first.starts_with(second)),
        Comparison::EndsWith => return Ok(first.ends_with(second)),
        _ => {}
    }

    if !numeric {
        return Ok(comparison.holds(first.cmp(second)));
    }

    match (parse_number(first), parse_number(second)) {
        (Some(a), Some(b)) => Ok(a.partial_cmp(&b).is_some_and(|o| comparison.holds(o))),
        _ => Err(format!("'{}' or '{}' is not a number", first, second)),
    }
}

/// Compare two values and branch: a false condition takes the Error edge
pub struct ConditionHandler;

#[async_trait]
impl BlockHandler for ConditionHandler {
    fn block_type(&self) -> &str {
        block_types::IF
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        let config: ConditionConfig = parse_config(ctx);

        let Some(comparison) = Comparison::parse(&config.operator) else {
            return StepResult::error(format!(
                "IF '{}': unsupported operator '{}'",
                ctx.display_name(),
                config.operator
            ));
        };

        let numeric = config.data_type.trim().eq_ignore_ascii_case("number");
        let first = ctx.store.resolve(&config.first);
        let second = ctx.store.resolve(&config.second);

        let (holds, note) = match evaluate(comparison, numeric, &first, &second) {
            Ok(holds) => (holds, None),
            Err(reason) => (false, Some(reason)),
        };

        let mut description = format!(
            "IF {} {} {} ({}) => {}",
            first,
            comparison.symbol(),
            second,
            if numeric { "Number" } else { "String" },
            holds
        );
        if let Some(note) = note {
            description.push_str(&format!(" ({})", note));
        }

        StepResult {
            is_error: !holds,
            description,
            branch_key: None,
        }
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Compare two values; false follows the Error connection", "control")
    }
}
