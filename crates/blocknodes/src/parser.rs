use crate::config::{lenient_string, parse_config, scalar_text};
use async_trait::async_trait;
use blockcore::{block_types, BlockContext, BlockHandler, HandlerMetadata, StepResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParserConfig {
    #[serde(deserialize_with = "lenient_string")]
    format: String,
    #[serde(rename = "sourcevariable", deserialize_with = "lenient_string")]
    source_variable: String,
    mappings: Vec<Mapping>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Mapping {
    #[serde(deserialize_with = "lenient_string")]
    path: String,
    #[serde(deserialize_with = "lenient_string")]
    variable: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Xml,
}

/// A parsed source document
enum Document {
    Json(Value),
    Xml(XmlElement),
}

impl Document {
    fn parse(format: Format, source: &str) -> Result<Self, String> {
        match format {
            Format::Json => serde_json::from_str(source)
                .map(Document::Json)
                .map_err(|e| e.to_string()),
            Format::Xml => parse_xml(source).map(Document::Xml),
        }
    }

    fn select(&self, path: &str) -> Option<String> {
        match self {
            Document::Json(root) => select_json(root, path).map(scalar_text),
            Document::Xml(root) => select_xml(root, path),
        }
    }
}

/// Extract values from a JSON or XML variable into other variables
pub struct ParserHandler;

#[async_trait]
impl BlockHandler for ParserHandler {
    fn block_type(&self) -> &str {
        block_types::PARSER
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        let config: ParserConfig = parse_config(ctx);

        let format = match config.format.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Format::Json,
            "xml" => Format::Xml,
            other => {
                return StepResult::error(format!("Parser '{}': unsupported format '{}'", ctx.display_name(), other));
            }
        };
        let format_name = if format == Format::Json { "json" } else { "xml" };

        let source = ctx.store.get(&config.source_variable).unwrap_or_default().to_string();
        let document = match Document::parse(format, &source) {
            Ok(document) => document,
            Err(e) => {
                return StepResult::error(format!(
                    "Parser ({}): cannot parse '{}': {}",
                    format_name, config.source_variable, e
                ));
            }
        };

        let mut mapped = 0;
        for mapping in &config.mappings {
            if mapping.variable.trim().is_empty() {
                continue;
            }
            match document.select(&mapping.path) {
                Some(value) => {
                    ctx.store.set(&mapping.variable, value);
                    mapped += 1;
                }
                None => ctx.events.warn(format!(
                    "Parser '{}': path '{}' not found, skipped",
                    ctx.display_name(),
                    mapping.path
                )),
            }
        }

        StepResult::success(format!(
            "Parser ({}): mapped {} of {} paths from '{}'",
            format_name,
            mapped,
            config.mappings.len(),
            config.source_variable
        ))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Extract values from JSON or XML into variables", "transform")
    }
}

#[derive(Debug, PartialEq)]
enum JsonSegment {
    Key(String),
    Index(usize),
}

/// Parse `$.a.b[0]`, `a.b`, `$['a']["b"]` style paths.
fn parse_json_path(path: &str) -> Option<Vec<JsonSegment>> {
    let path = path.trim();
    let mut rest = path.strip_prefix('$').unwrap_or(path);
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']')?;
            let inner = after[..close].trim();
            let quoted = inner
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
            segments.push(match quoted {
                Some(key) => JsonSegment::Key(key.to_string()),
                None => JsonSegment::Index(inner.parse().ok()?),
            });
            rest = &after[close + 1..];
        } else {
            let after = rest.strip_prefix('.').unwrap_or(rest);
            let end = after.find(['.', '[']).unwrap_or(after.len());
            if end > 0 {
                segments.push(JsonSegment::Key(after[..end].to_string()));
            }
            rest = &after[end..];
        }
    }

    Some(segments)
}

fn select_json<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    parse_json_path(path)?
        .iter()
        .try_fold(root, |value, segment| match (segment, value) {
            (JsonSegment::Key(key), Value::Object(map)) => map.get(key),
            (JsonSegment::Key(key), Value::Array(items)) => items.get(key.parse::<usize>().ok()?),
            (JsonSegment::Index(i), Value::Array(items)) => items.get(*i),
            _ => None,
        })
}

#[derive(Debug, Default)]
struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, String> {
        let mut element = XmlElement {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..XmlElement::default()
        };
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    /// Text of the element and all of its descendants, in document order
    fn string_value(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.string_value());
        }
        out
    }

    fn is_named(&self, name: &str) -> bool {
        name == "*" || self.name == name
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
        if self.is_named(name) {
            out.push(self);
        }
        for child in &self.children {
            child.collect_named(name, out);
        }
    }
}

fn parse_xml(source: &str) -> Result<XmlElement, String> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(XmlElement::from_start(&e)?),
            Ok(Event::Empty(e)) => {
                let element = XmlElement::from_start(&e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or("unexpected closing tag")?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unclosed element".to_string());
    }
    root.ok_or_else(|| "no root element".to_string())
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(format!("multiple root elements ('{}' after the root)", element.name)),
    }
    Ok(())
}

/// Split `name[2]` into the name and its 1-based position.
fn parse_step(step: &str) -> Option<(&str, Option<usize>)> {
    match step.split_once('[') {
        Some((name, predicate)) => {
            let position: usize = predicate.strip_suffix(']')?.trim().parse().ok()?;
            (position >= 1).then_some((name, Some(position)))
        }
        None => Some((step, None)),
    }
}

/// Evaluate an XPath-like expression: `/a/b`, `/a/b[2]`, `//b`,
/// `/a/@attr` and `/a/text()`. Positions count over all matches of a step.
fn select_xml(root: &XmlElement, path: &str) -> Option<String> {
    let path = path.trim();
    let (descendant, rest) = match path.strip_prefix("//") {
        Some(rest) => (true, rest),
        None => (false, path.strip_prefix('/').unwrap_or(path)),
    };

    let steps: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let (last, init) = steps.split_last()?;
    let (element_steps, tail) = if last.starts_with('@') || *last == "text()" {
        (init, Some(*last))
    } else {
        (steps.as_slice(), None)
    };

    let (first, others) = element_steps.split_first()?;
    let (name, position) = parse_step(first)?;
    let mut current: Vec<&XmlElement> = Vec::new();
    if descendant {
        root.collect_named(name, &mut current);
    } else if root.is_named(name) {
        current.push(root);
    }
    current = pick(current, position);

    for step in others {
        let (name, position) = parse_step(step)?;
        let next = current
            .iter()
            .copied()
            .flat_map(|el| el.children.iter().filter(move |c| c.is_named(name)))
            .collect();
        current = pick(next, position);
    }

    let element = current.first()?;
    match tail {
        Some(attr) if attr.starts_with('@') => element
            .attributes
            .iter()
            .find(|(k, _)| k == &attr[1..])
            .map(|(_, v)| v.clone()),
        Some(_) => Some(element.text.clone()),
        None => Some(element.string_value()),
    }
}

fn pick(elements: Vec<&XmlElement>, position: Option<usize>) -> Vec<&XmlElement> {
    match position {
        Some(n) => elements.into_iter().nth(n - 1).into_iter().collect(),
        None => elements,
    }
}
