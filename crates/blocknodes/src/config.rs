//! Lenient parsing of block `jsonConfig` documents.
//!
//! Keys are matched case-insensitively and without underscores, so
//! `FirstVariable`, `firstVariable` and `first_variable` all land on the
//! field renamed `firstvariable`. Scalar fields accept strings, numbers and
//! booleans interchangeably.

use blockcore::BlockContext;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse the block's config, falling back to defaults on any problem.
pub(crate) fn parse_config<T>(ctx: &BlockContext<'_>) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = ctx.raw_config() else {
        return T::default();
    };

    let parsed = serde_json::from_str::<Value>(raw)
        .map(normalize_keys)
        .and_then(serde_json::from_value::<T>);

    match parsed {
        Ok(config) => config,
        Err(e) => {
            ctx.events.warn(format!(
                "Block '{}' has an invalid config ({}); using defaults",
                ctx.block.name, e
            ));
            T::default()
        }
    }
}

fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase().replace(['_', '-'], ""), normalize_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Render a scalar as text; null and containers become empty / JSON text.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(&Value::deserialize(deserializer)?))
}

pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    })
}
