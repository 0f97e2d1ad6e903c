//! Step normalization: one untyped record to one validated [`Step`].
//!
//! Identity comes from the record's position in the response, not from the
//! `step` number the model wrote, so gaps and out-of-order numbering are
//! tolerated.

use std::collections::BTreeSet;

use serde_json::Value;

use super::error::ValidationError;
use super::extract::{DependencyRef, RawStepRecord};
use super::types::{Action, Step, step_id};

/// Characters rejected in paths because some common filesystem forbids them.
pub const ILLEGAL_PATH_CHARS: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

/// A validated step plus the dependency references still to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub step: Step,
    pub references: Vec<DependencyRef>,
}

/// Validate one raw record and assign its identity.
pub fn normalize_record(record: &RawStepRecord) -> Result<NormalizedRecord, ValidationError> {
    let number = step_number(record)?;

    let action_str = required_string(record, "action")?;
    let action: Action = action_str
        .parse()
        .map_err(|_| ValidationError::InvalidAction {
            step: number,
            action: action_str.to_owned(),
        })?;

    let description = required_string(record, "description")?.trim();
    if description.is_empty() {
        return Err(ValidationError::EmptyField {
            step: number,
            field: "description",
        });
    }

    let path = required_string(record, "path")?.trim();
    if path.is_empty() {
        return Err(ValidationError::EmptyField {
            step: number,
            field: "path",
        });
    }
    validate_path(number, path)?;

    let references = dependency_refs(record)?;

    Ok(NormalizedRecord {
        step: Step {
            sequence: record.position,
            declared_number: number,
            id: step_id(record.position),
            action,
            description: description.to_owned(),
            path: path.to_owned(),
            depends_on: BTreeSet::new(),
        },
        references,
    })
}

/// Check that `path` is relative, stays inside its root, and is portable.
pub fn validate_path(step: u64, path: &str) -> Result<(), ValidationError> {
    if is_absolute(path) {
        return Err(ValidationError::AbsolutePath {
            step,
            path: path.to_owned(),
        });
    }

    if let Some(character) = path
        .chars()
        .find(|c| ILLEGAL_PATH_CHARS.contains(c) || c.is_control())
    {
        return Err(ValidationError::IllegalPathCharacter {
            step,
            path: path.to_owned(),
            character,
        });
    }

    let mut depth: usize = 0;
    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ValidationError::PathEscapesWorkspace {
                        step,
                        path: path.to_owned(),
                    })?;
            }
            _ => depth += 1,
        }
    }

    Ok(())
}

/// Leading separator or a Windows drive prefix such as `C:`.
fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with(['/', '\\'])
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

fn step_number(record: &RawStepRecord) -> Result<u64, ValidationError> {
    let value = record
        .field(&["step"])
        .ok_or_else(|| invalid(record, "step", "is missing"))?;
    value
        .as_u64()
        .filter(|n| *n >= 1)
        .ok_or_else(|| invalid(record, "step", "must be a positive integer"))
}

fn required_string<'a>(
    record: &'a RawStepRecord,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match record.field(&[field]) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(invalid(record, field, "must be a string")),
        None => Err(invalid(record, field, "is missing")),
    }
}

fn dependency_refs(record: &RawStepRecord) -> Result<Vec<DependencyRef>, ValidationError> {
    let entries = match record.field(&["dependsOn", "depends_on"]) {
        None => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(invalid(record, "dependsOn", "must be an array")),
    };

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            dependency_ref(entry).ok_or_else(|| {
                invalid(
                    record,
                    "dependsOn",
                    format!("entry {} must be a positive step number or a step id", i + 1),
                )
            })
        })
        .collect()
}

/// Classify one `dependsOn` entry. Digit-only strings count as step numbers.
fn dependency_ref(entry: &Value) -> Option<DependencyRef> {
    match entry {
        Value::Number(n) => n.as_u64().filter(|n| *n >= 1).map(DependencyRef::ByNumber),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else if s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse().ok().filter(|n| *n >= 1).map(DependencyRef::ByNumber)
            } else {
                Some(DependencyRef::ById(s.to_owned()))
            }
        }
        _ => None,
    }
}

fn invalid(
    record: &RawStepRecord,
    field: &'static str,
    reason: impl Into<String>,
) -> ValidationError {
    ValidationError::InvalidField {
        record: record.position,
        field,
        reason: reason.into(),
    }
}
