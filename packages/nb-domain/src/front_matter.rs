use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::{Error, Result};

const DELIMITER: &str = "---";
const OPENING: &str = "---\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split<'a> {
	/// Verbatim text between the delimiters. Empty when the note has no front matter.
	pub raw: &'a str,
	pub body: &'a str,
}

/// A note opens with `---\n`, carries a YAML mapping, and closes at the next `---`. Anything
/// else is plain body text with empty front matter.
pub fn split(content: &str) -> Split<'_> {
	let Some(rest) = content.strip_prefix(OPENING) else {
		return Split { raw: "", body: content };
	};
	let Some(end) = rest.find(DELIMITER) else {
		return Split { raw: "", body: content };
	};
	let raw = &rest[..end];
	let after = &rest[end + DELIMITER.len()..];
	let body = strip_newline(strip_newline(after));

	Split { raw, body }
}

/// Converts raw YAML front matter into JSON object text. Malformed YAML, non-mapping documents,
/// and empty input all yield `{}`.
pub fn to_json(raw: &str) -> String {
	yaml_to_object(raw)
		.and_then(|object| serde_json::to_string(&object).ok())
		.unwrap_or_else(|| "{}".to_string())
}

/// Renders JSON object text as YAML front matter. An empty object renders as an empty string.
pub fn to_yaml(json: &str) -> Result<String> {
	let value: JsonValue = serde_json::from_str(json)?;
	let JsonValue::Object(object) = value else {
		return Err(Error::FrontMatterNotMapping);
	};

	if object.is_empty() {
		return Ok(String::new());
	}

	Ok(serde_yaml::to_string(&object)?)
}

fn yaml_to_object(raw: &str) -> Option<JsonValue> {
	if raw.trim().is_empty() {
		return None;
	}

	let value: YamlValue = serde_yaml::from_str(raw).ok()?;

	match value {
		YamlValue::Mapping(_) => serde_json::to_value(&value).ok(),
		_ => None,
	}
}

fn strip_newline(text: &str) -> &str {
	text.strip_prefix("\r\n").or_else(|| text.strip_prefix('\n')).unwrap_or(text)
}
