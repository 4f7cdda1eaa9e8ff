use crate::config::{lenient_bool, lenient_string, parse_config};
use async_trait::async_trait;
use blockcore::{block_types, BlockContext, BlockHandler, HandlerMetadata, StepResult, VariableStore};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// Input text: a non-empty `InputVariable` wins over the literal `Input`.
fn input_text(store: &VariableStore, input: &str, input_variable: &str) -> String {
    if input_variable.trim().is_empty() {
        store.resolve(input)
    } else {
        store.get(input_variable).unwrap_or_default().to_string()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TextTransformConfig {
    #[serde(deserialize_with = "lenient_string")]
    input: String,
    #[serde(rename = "inputvariable", deserialize_with = "lenient_string")]
    input_variable: String,
    #[serde(deserialize_with = "lenient_string")]
    operation: String,
    #[serde(rename = "resultvariable", deserialize_with = "lenient_string")]
    result_variable: String,
}

/// Trim or change the case of text
pub struct TextTransformHandler;

#[async_trait]
impl BlockHandler for TextTransformHandler {
    fn block_type(&self) -> &str {
        block_types::TEXT_TRANSFORM
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        let config: TextTransformConfig = parse_config(ctx);
        let input = input_text(ctx.store, &config.input, &config.input_variable);

        let transformed = match config.operation.trim().to_ascii_lowercase().as_str() {
            "trim" => Some(input.trim().to_string()),
            "lower" | "lowercase" | "tolower" => Some(input.to_lowercase()),
            "upper" | "uppercase" | "toupper" => Some(input.to_uppercase()),
            _ => None,
        };

        let (output, result) = match transformed {
            Some(output) => {
                let description = format!("TextTransform {}: '{}' -> '{}'", config.operation, input, output);
                (output, StepResult::success(description))
            }
            None => {
                let description = format!(
                    "TextTransform '{}': unsupported operation '{}', input kept",
                    ctx.display_name(),
                    config.operation
                );
                (input, StepResult::error(description))
            }
        };

        if !config.result_variable.trim().is_empty() {
            ctx.store.set(&config.result_variable, output);
        }
        result
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Trim, lowercase or uppercase text", "text")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TextReplaceConfig {
    #[serde(deserialize_with = "lenient_string")]
    input: String,
    #[serde(rename = "inputvariable", deserialize_with = "lenient_string")]
    input_variable: String,
    #[serde(alias = "rules")]
    replacements: Vec<ReplacementRule>,
    #[serde(rename = "resultvariable", deserialize_with = "lenient_string")]
    result_variable: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct ReplacementRule {
    #[serde(deserialize_with = "lenient_string")]
    from: String,
    #[serde(deserialize_with = "lenient_string")]
    to: String,
    #[serde(rename = "useregex", deserialize_with = "lenient_bool")]
    use_regex: bool,
    #[serde(rename = "ignorecase", deserialize_with = "lenient_bool")]
    ignore_case: bool,
}

/// Ordered literal or regex replacements
pub struct TextReplaceHandler {
    regex_size_limit: usize,
    max_pattern_len: usize,
}

impl TextReplaceHandler {
    pub fn new(regex_size_limit: usize, max_pattern_len: usize) -> Self {
        Self {
            regex_size_limit,
            max_pattern_len,
        }
    }

    /// Compile a rule. Literal rules are escaped so both kinds share the
    /// same case-insensitivity and size limits.
    fn compile(&self, rule: &ReplacementRule) -> Result<Regex, String> {
        let pattern = if rule.use_regex {
            rule.from.clone()
        } else {
            regex::escape(&rule.from)
        };
        if pattern.len() > self.max_pattern_len {
            return Err(format!(
                "pattern longer than {} characters",
                self.max_pattern_len
            ));
        }

        RegexBuilder::new(&pattern)
            .case_insensitive(rule.ignore_case)
            .size_limit(self.regex_size_limit)
            .build()
            .map_err(|e| e.to_string())
    }

    /// Apply the rules in order; returns the text and the skipped rules.
    fn apply(&self, input: &str, rules: &[ReplacementRule]) -> (String, Vec<String>) {
        let mut text = input.to_string();
        let mut skipped = Vec::new();

        for (i, rule) in rules.iter().enumerate() {
            if rule.from.is_empty() {
                skipped.push(format!("rule {}: empty pattern", i + 1));
                continue;
            }

            if !rule.use_regex && !rule.ignore_case {
                text = text.replace(&rule.from, &rule.to);
                continue;
            }

            match self.compile(rule) {
                Ok(re) => {
                    // literal replacements must not expand `$1` style groups
                    text = if rule.use_regex {
                        re.replace_all(&text, rule.to.as_str()).into_owned()
                    } else {
                        re.replace_all(&text, regex::NoExpand(&rule.to)).into_owned()
                    };
                }
                Err(e) => skipped.push(format!("rule {} ('{}'): {}", i + 1, rule.from, e)),
            }
        }

        (text, skipped)
    }
}

#[async_trait]
impl BlockHandler for TextReplaceHandler {
    fn block_type(&self) -> &str {
        block_types::TEXT_REPLACE
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        let config: TextReplaceConfig = parse_config(ctx);
        let input = input_text(ctx.store, &config.input, &config.input_variable);

        let (output, skipped) = self.apply(&input, &config.replacements);
        for reason in &skipped {
            ctx.events.warn(format!("TextReplace '{}': skipped {}", ctx.display_name(), reason));
        }

        let mut description = format!(
            "TextReplace: applied {} of {} rules: '{}' -> '{}'",
            config.replacements.len() - skipped.len(),
            config.replacements.len(),
            input,
            output
        );
        if !skipped.is_empty() {
            description.push_str(&format!(" (skipped {})", skipped.join("; ")));
        }

        if !config.result_variable.trim().is_empty() {
            ctx.store.set(&config.result_variable, output);
        }
        StepResult::success(description)
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Apply literal or regex replacements in order", "text")
    }
}
