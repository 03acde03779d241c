//! AI Response Validation
//!
//! Validation layer for the structured-output contract: every analytical
//! stage expects the LLM reply to contain exactly one fenced YAML block.
//! Absence of that block, or a block that fails schema validation, is a hard
//! failure surfaced with the stage name.
//!
//! ## Design Philosophy
//! - Fail fast on structural errors, no silent coercion
//! - The only permitted normalization is numeric-prefix extraction from
//!   `"3 # path/to/file"` index strings

use serde_yaml::{Mapping, Sequence, Value};

use crate::types::{Result, ValidationError};

// =============================================================================
// Fenced Block Extraction
// =============================================================================

/// Extract the single fenced YAML block from an LLM reply.
///
/// Accepts ```` ```yaml ```` and ```` ```yml ```` fences. Zero or multiple
/// blocks are both contract violations.
pub fn extract_yaml_block(response: &str, stage: &str) -> Result<String> {
    let mut blocks = Vec::new();
    let mut lines = response.lines();

    while let Some(line) = lines.next() {
        let fence = line.trim();
        if fence == "```yaml" || fence == "```yml" {
            let mut block = String::new();
            let mut closed = false;
            for inner in lines.by_ref() {
                if inner.trim() == "```" {
                    closed = true;
                    break;
                }
                block.push_str(inner);
                block.push('\n');
            }
            if !closed {
                return Err(ValidationError::new(
                    stage,
                    "fenced yaml block is not terminated",
                )
                .into());
            }
            blocks.push(block);
        }
    }

    match blocks.len() {
        1 => Ok(blocks.remove(0)),
        0 => Err(ValidationError::new(stage, "response contains no fenced yaml block").into()),
        n => Err(ValidationError::new(
            stage,
            format!("response contains {} fenced yaml blocks, expected exactly one", n),
        )
        .into()),
    }
}

/// Extract and parse the single fenced YAML block in one step.
pub fn parse_yaml_block(response: &str, stage: &str) -> Result<Value> {
    let block = extract_yaml_block(response, stage)?;
    serde_yaml::from_str(&block).map_err(|e| {
        ValidationError::new(stage, format!("fenced block is not valid yaml: {}", e)).into()
    })
}

// =============================================================================
// Index Parsing
// =============================================================================

/// Parse an index value that may be a plain integer or a commented string
/// like `"3 # path/to/file"`.
///
/// This is the only normalization the structured-output contract permits.
pub fn parse_index(value: &Value, stage: &str, field: &str) -> Result<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| index_error(stage, field, &format!("{:?}", n))),
        Value::String(s) => {
            let prefix = s.split('#').next().unwrap_or("").trim();
            prefix
                .parse::<usize>()
                .map_err(|_| index_error(stage, field, s))
        }
        other => Err(index_error(stage, field, &format!("{:?}", other))),
    }
}

fn index_error(stage: &str, field: &str, actual: &str) -> crate::types::TomeError {
    ValidationError::new(stage, "expected a non-negative integer index")
        .with_field(field)
        .with_comparison("integer or \"N # comment\" string", actual)
        .into()
}

// =============================================================================
// Mapping Field Helpers
// =============================================================================

/// Require a non-empty string field on a YAML mapping.
pub fn require_str(map: &Mapping, key: &str, stage: &str) -> Result<String> {
    match map.get(Value::from(key)) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(other) => Err(ValidationError::new(stage, "expected a non-empty string")
            .with_field(key)
            .with_comparison("string", format!("{:?}", other))
            .into()),
        None => Err(ValidationError::new(stage, "missing required field")
            .with_field(key)
            .into()),
    }
}

/// Require a sequence field on a YAML mapping.
pub fn require_sequence<'a>(map: &'a Mapping, key: &str, stage: &str) -> Result<&'a Sequence> {
    match map.get(Value::from(key)) {
        Some(Value::Sequence(seq)) => Ok(seq),
        Some(other) => Err(ValidationError::new(stage, "expected a sequence")
            .with_field(key)
            .with_comparison("sequence", format!("{:?}", other))
            .into()),
        None => Err(ValidationError::new(stage, "missing required field")
            .with_field(key)
            .into()),
    }
}

/// Require that a YAML value is a mapping.
pub fn require_mapping<'a>(value: &'a Value, stage: &str) -> Result<&'a Mapping> {
    value.as_mapping().ok_or_else(|| {
        ValidationError::new(stage, "expected a yaml mapping")
            .with_comparison("mapping", yaml_kind(value))
            .into()
    })
}

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}
