//! Chart template filters
//!
//! These extend MiniJinja with the string and encoding helpers chart authors
//! expect when producing Kubernetes manifests.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use minijinja::{Error, ErrorKind, Value};

/// Filters registered on every engine environment
pub const AVAILABLE_FILTERS: &[&str] = &[
    "toyaml", "tojson", "b64encode", "b64decode", "quote", "squote", "indent", "nindent",
    "trunc", "required",
];

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

/// Strings render bare; everything else uses its template representation
fn text_of(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(|e| invalid(e.to_string()))
}

/// `{{ values.resources | toyaml }}`
pub fn toyaml(value: Value) -> Result<String, Error> {
    let yaml = serde_yaml::to_string(&to_json(&value)?).map_err(|e| invalid(e.to_string()))?;
    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

/// `{{ values.config | tojson }}`
pub fn tojson(value: Value) -> Result<String, Error> {
    serde_json::to_string(&to_json(&value)?).map_err(|e| invalid(e.to_string()))
}

pub fn b64encode(value: Value) -> String {
    STANDARD.encode(text_of(&value))
}

pub fn b64decode(value: String) -> Result<String, Error> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|e| invalid(format!("base64 decode error: {e}")))?;
    String::from_utf8(bytes).map_err(|e| invalid(format!("decoded data is not UTF-8: {e}")))
}

pub fn quote(value: Value) -> String {
    let text = text_of(&value);
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn squote(value: Value) -> String {
    format!("'{}'", text_of(&value).replace('\'', "''"))
}

/// Prefix every non-empty line with `spaces` spaces
pub fn indent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    value
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Like [`indent`], starting on a fresh line
pub fn nindent(value: String, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Keep the first `length` characters; a negative length keeps the last ones
pub fn trunc(value: String, length: i64) -> String {
    let count = value.chars().count();
    let keep = usize::try_from(length.unsigned_abs())
        .unwrap_or(usize::MAX)
        .min(count);
    if length >= 0 {
        value.chars().take(keep).collect()
    } else {
        value.chars().skip(count - keep).collect()
    }
}

/// Fail rendering when a value is missing or an empty string
///
/// `{{ values.host | required("host is required") }}`
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(str::is_empty);
    if missing {
        Err(invalid(
            message.unwrap_or_else(|| "required value is missing".to_string()),
        ))
    } else {
        Ok(value)
    }
}
