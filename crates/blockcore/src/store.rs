use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Prefix marking a token as a variable reference (`$name`).
pub const VARIABLE_SIGIL: char = '$';

/// Run-scoped variable store.
///
/// Every value is kept as a string; handlers parse and format on demand.
/// A fresh store is created per execution and dropped when the run ends.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableStore {
    values: HashMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable. `$name` and `name` address the same entry.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(variable_name(name)).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = variable_name(name);
        if name.is_empty() {
            return;
        }
        self.values.insert(name.to_string(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(variable_name(name))
    }

    /// Resolve a token: `$name` is looked up (missing resolves to an empty
    /// string), anything else is returned as a literal.
    pub fn resolve(&self, token: &str) -> String {
        match token.trim().strip_prefix(VARIABLE_SIGIL) {
            Some(name) => self.get(name).unwrap_or_default().to_string(),
            None => token.to_string(),
        }
    }

    /// Resolve a token and parse it as a finite double.
    pub fn resolve_number(&self, token: &str) -> Option<f64> {
        parse_number(&self.resolve(token))
    }

    /// Expand free text: a whole `$name` token resolves like [`resolve`],
    /// otherwise every `{{name}}` placeholder is replaced by its value.
    ///
    /// [`resolve`]: VariableStore::resolve
    pub fn expand(&self, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.starts_with(VARIABLE_SIGIL) && !trimmed.contains(char::is_whitespace) {
            return self.resolve(trimmed);
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find("{{") {
            let Some(close) = rest[open + 2..].find("}}") else {
                break;
            };
            out.push_str(&rest[..open]);
            let name = rest[open + 2..open + 2 + close].trim();
            out.push_str(self.get(name).unwrap_or_default());
            rest = &rest[open + 2 + close + 2..];
        }
        out.push_str(rest);
        out
    }

    /// Ordered copy of every variable, used for execution records.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = VariableStore::new();
        for (k, v) in iter {
            let name: String = k.into();
            store.set(&name, v);
        }
        store
    }
}

/// Strip the optional sigil and surrounding whitespace from a variable name.
pub fn variable_name(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix(VARIABLE_SIGIL).unwrap_or(name).trim()
}

/// Parse a stored value as a finite IEEE-754 double.
pub fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Format a number without superfluous trailing zeros (`6.0` -> `"6"`).
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // also folds -0.0
        return "0".to_string();
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigil_and_plain_names_are_the_same_variable() {
        let mut store = VariableStore::new();
        store.set("$x", "5");
        assert_eq!(store.get("x"), Some("5"));
        assert_eq!(store.get("$x"), Some("5"));
        assert!(store.contains(" $x "));
    }

    #[test]
    fn test_resolve_literal_and_reference() {
        let store: VariableStore = [("name", "Ada")].into_iter().collect();
        assert_eq!(store.resolve("$name"), "Ada");
        assert_eq!(store.resolve("name"), "name");
        assert_eq!(store.resolve("$missing"), "");
    }

    #[test]
    fn test_expand_placeholders() {
        let store: VariableStore = [("host", "example.com"), ("id", "7")].into_iter().collect();
        assert_eq!(
            store.expand("https://{{host}}/items/{{ id }}"),
            "https://example.com/items/7"
        );
        assert_eq!(store.expand("$id"), "7");
        assert_eq!(store.expand("cost: $5 {{unclosed"), "cost: $5 {{unclosed");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(2.5 + 3.5), "6");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(-12.0), "-12");
    }

    #[test]
    fn test_parse_number_rejects_non_finite() {
        assert_eq!(parse_number(" 3.5 "), Some(3.5));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number(""), None);
    }
}
