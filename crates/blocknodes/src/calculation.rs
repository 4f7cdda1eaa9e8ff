use crate::config::{lenient_string, parse_config};
use async_trait::async_trait;
use blockcore::{
    block_types, format_number, parse_number, BlockContext, BlockHandler, HandlerMetadata,
    StepResult,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CalculationConfig {
    #[serde(deserialize_with = "lenient_string")]
    operation: String,
    #[serde(rename = "firstvariable", deserialize_with = "lenient_string")]
    first_variable: String,
    #[serde(rename = "secondvariable", deserialize_with = "lenient_string")]
    second_variable: String,
    #[serde(rename = "resultvariable", deserialize_with = "lenient_string")]
    result_variable: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
}

impl Operation {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "add" | "+" => Some(Operation::Add),
            "subtract" | "-" => Some(Operation::Subtract),
            "multiply" | "*" => Some(Operation::Multiply),
            "divide" | "/" => Some(Operation::Divide),
            "concat" | "concatenate" => Some(Operation::Concat),
            _ => None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Subtract => "-",
            Operation::Multiply => "*",
            Operation::Divide => "/",
            Operation::Concat => "&",
        }
    }
}

/// Apply an operation to two resolved operands.
///
/// Never fails: non-numeric operands make Add concatenate and the other
/// arithmetic operations keep the first operand, as does division by zero.
fn calculate(operation: Operation, first: &str, second: &str) -> (String, Option<&'static str>) {
    match (operation, parse_number(first), parse_number(second)) {
        (Operation::Concat, _, _) => (format!("{}{}", first, second), None),
        (Operation::Add, Some(a), Some(b)) => (format_number(a + b), None),
        (Operation::Subtract, Some(a), Some(b)) => (format_number(a - b), None),
        (Operation::Multiply, Some(a), Some(b)) => (format_number(a * b), None),
        (Operation::Divide, Some(a), Some(b)) if b == 0.0 => {
            (format_number(a), Some("division by zero, first operand kept"))
        }
        (Operation::Divide, Some(a), Some(b)) => (format_number(a / b), None),
        (Operation::Add, _, _) => (
            format!("{}{}", first, second),
            Some("non-numeric operands, concatenated"),
        ),
        _ => (
            first.to_string(),
            Some("non-numeric operands, first operand kept"),
        ),
    }
}

/// Arithmetic or concatenation on two operands
pub struct CalculationHandler;

#[async_trait]
impl BlockHandler for CalculationHandler {
    fn block_type(&self) -> &str {
        block_types::CALCULATION
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        let config: CalculationConfig = parse_config(ctx);

        let Some(operation) = Operation::parse(&config.operation) else {
            return StepResult::error(format!(
                "Calculation '{}': unsupported operation '{}'",
                ctx.display_name(),
                config.operation
            ));
        };

        let first = ctx.store.resolve(&config.first_variable);
        let second = ctx.store.resolve(&config.second_variable);
        let (result, note) = calculate(operation, &first, &second);

        let mut description = format!(
            "Calculation: {} {} {} = {}",
            first,
            operation.symbol(),
            second,
            result
        );
        if let Some(note) = note {
            ctx.events.warn(format!("Calculation '{}': {}", ctx.display_name(), note));
            description.push_str(&format!(" ({})", note));
        }

        if config.result_variable.trim().is_empty() {
            description.push_str(" (no result variable)");
        } else {
            ctx.store.set(&config.result_variable, result);
        }

        StepResult::success(description)
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Add, subtract, multiply, divide or concatenate two values", "data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_normalizes_output() {
        assert_eq!(calculate(Operation::Add, "2.5", "3.5").0, "6");
        assert_eq!(calculate(Operation::Multiply, "1.5", "2").0, "3");
        assert_eq!(calculate(Operation::Subtract, "1", "1.25").0, "-0.25");
    }

    #[test]
    fn test_divide_by_zero_keeps_first_operand() {
        let (result, note) = calculate(Operation::Divide, "5", "0");
        assert_eq!(result, "5");
        assert!(note.is_some());
    }

    #[test]
    fn test_non_numeric_fallbacks_are_deterministic() {
        assert_eq!(calculate(Operation::Add, "foo", "1").0, "foo1");
        assert_eq!(calculate(Operation::Subtract, "foo", "1").0, "foo");
        assert_eq!(calculate(Operation::Divide, "", "2").0, "");
        assert_eq!(calculate(Operation::Concat, "3", "4").0, "34");
    }
}
