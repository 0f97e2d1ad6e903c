//! Response extraction: model text to untyped step records.
//!
//! The model's answer is untrusted. It is parsed into a generic
//! [`serde_json::Value`] tree first; nothing here assigns meaning to the
//! fields of a record. Typed validation happens in [`super::normalize`].

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use super::error::PlanError;

/// Keys that may hold the step array when the model wraps it in an object.
const WRAPPER_KEYS: [&str; 3] = ["steps", "plan", "actions"];

/// Keys that may hold the model's explanation in a wrapper object.
const REASONING_KEYS: [&str; 2] = ["reasoning", "explanation"];

/// One step record exactly as the model wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStepRecord {
    /// 1-based position in the response's step array.
    pub position: usize,
    /// The record's fields, unvalidated. Unknown keys are carried but unused.
    pub fields: Map<String, Value>,
}

impl RawStepRecord {
    /// Return the first present, non-null value among `names`.
    pub fn field(&self, names: &[&str]) -> Option<&Value> {
        names
            .iter()
            .filter_map(|name| self.fields.get(*name))
            .find(|value| !value.is_null())
    }
}

/// A dependency reference as written by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyRef {
    /// Refers to the record whose declared `step` number matches.
    ByNumber(u64),
    /// Refers to an assigned identity such as `step_3`.
    ById(String),
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByNumber(n) => write!(f, "{n}"),
            Self::ById(id) => f.write_str(id),
        }
    }
}

/// The records and optional explanation found in one model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedResponse {
    pub records: Vec<RawStepRecord>,
    pub reasoning: Option<String>,
}

/// Extract step records from raw model output.
///
/// Accepts a bare JSON array, an array wrapped one level deep in an object,
/// and either of those inside a markdown code fence. When the text is not
/// JSON as it stands, `<think>` blocks are removed before looking again.
pub fn extract_response(text: &str) -> Result<ExtractedResponse, PlanError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PlanError::parse("response is empty", text));
    }

    let (value, preamble) = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => (value, None),
        Err(direct) => parse_without_think_blocks(text, direct)?,
    };

    let (items, wrapped_reasoning) = locate_records(value, text)?;

    let records = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(fields) => Ok(RawStepRecord {
                position: i + 1,
                fields,
            }),
            other => Err(PlanError::parse(
                format!(
                    "element {} of the step array is {}, not an object",
                    i + 1,
                    json_type(&other)
                ),
                text,
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(records = records.len(), "extracted step records");

    Ok(ExtractedResponse {
        records,
        reasoning: wrapped_reasoning.or(preamble),
    })
}

/// Second attempt: drop `<think>` blocks, then try plain JSON and a code fence.
fn parse_without_think_blocks(
    text: &str,
    direct: serde_json::Error,
) -> Result<(Value, Option<String>), PlanError> {
    let cleaned = strip_reasoning_tags(text);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(PlanError::parse("response holds nothing but reasoning", text));
    }
    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok((value, None));
    }

    match extract_fenced_block(cleaned) {
        Some(block) => {
            let value = serde_json::from_str::<Value>(block.body).map_err(|e| {
                PlanError::parse(format!("fenced block is not valid JSON: {e}"), block.body)
            })?;
            let preamble = Some(block.preamble.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_owned);
            Ok((value, preamble))
        }
        None => Err(PlanError::parse(
            format!("response is not valid JSON: {direct}"),
            text,
        )),
    }
}

/// Find the step array in a parsed response and any wrapper-level reasoning.
fn locate_records(value: Value, text: &str) -> Result<(Vec<Value>, Option<String>), PlanError> {
    let mut map = match value {
        Value::Array(items) => return Ok((items, None)),
        Value::Object(map) => map,
        other => {
            return Err(PlanError::parse(
                format!("expected a JSON array of steps, found {}", json_type(&other)),
                text,
            ));
        }
    };

    let reasoning = REASONING_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::to_owned);

    let key = match WRAPPER_KEYS
        .iter()
        .find(|key| map.get(**key).is_some_and(Value::is_array))
    {
        Some(key) => (*key).to_owned(),
        None => {
            let candidates: Vec<&String> = map
                .iter()
                .filter(|(_, v)| v.is_array())
                .map(|(k, _)| k)
                .collect();
            match candidates.as_slice() {
                [only] => (*only).clone(),
                [] => {
                    return Err(PlanError::parse("object does not contain a step array", text));
                }
                many => {
                    let names: Vec<&str> = many.iter().map(|k| k.as_str()).collect();
                    return Err(PlanError::parse(
                        format!("object contains several arrays ({})", names.join(", ")),
                        text,
                    ));
                }
            }
        }
    };

    match map.remove(&key) {
        Some(Value::Array(items)) => Ok((items, reasoning)),
        _ => Err(PlanError::parse(format!("field {key:?} is not an array"), text)),
    }
}

/// A markdown code fence and the prose that precedes it.
struct FencedBlock<'a> {
    preamble: &'a str,
    body: &'a str,
}

/// Extract the first ```` ```json ```` or plain ```` ``` ```` block.
fn extract_fenced_block(text: &str) -> Option<FencedBlock<'_>> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let close = rest.find("```")?;
    Some(FencedBlock {
        preamble: &text[..open],
        body: rest[..close].trim(),
    })
}

/// Remove `<think>...</think>` blocks emitted by reasoning models.
///
/// An unclosed `<think>` removes everything after it.
pub fn strip_reasoning_tags(response: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut result = response.to_owned();
    while let Some(start) = result.find(OPEN) {
        match result[start..].find(CLOSE) {
            Some(rel_end) => {
                let end = start + rel_end + CLOSE.len();
                result.replace_range(start..end, "");
            }
            None => {
                result.truncate(start);
                break;
            }
        }
    }
    result
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
