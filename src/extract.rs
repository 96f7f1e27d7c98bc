//! Extraction boundary: validating extractor output before it reaches the graph.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::MemoryError;
use crate::store::MemoryGraph;

/// Concepts and topics extracted from one passage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedElements {
    pub concepts: Vec<String>,
    pub topics: Vec<String>,
}

impl ExtractedElements {
    pub fn new(concepts: Vec<String>, topics: Vec<String>) -> Self {
        Self { concepts, topics }
    }

    /// Validate loosely typed extractor output.
    ///
    /// Expects an object with optional `concepts` and `topics` arrays of
    /// strings. Missing or `null` arrays are empty; anything else is an
    /// [`MemoryError::Extraction`]. Labels are trimmed and blank ones dropped.
    pub fn from_value(value: &Value) -> Result<Self, MemoryError> {
        let Value::Object(map) = value else {
            return Err(MemoryError::Extraction(format!(
                "expected an object with concepts and topics (got {})",
                kind(value)
            )));
        };

        Ok(Self {
            concepts: labels(map.get("concepts"), "concepts")?,
            topics: labels(map.get("topics"), "topics")?,
        })
    }

    /// Parse and validate a JSON document from an extractor.
    pub fn from_json_str(json: &str) -> Result<Self, MemoryError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| MemoryError::Extraction(format!("invalid JSON: {}", e)))?;
        Self::from_value(&value)
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty() && self.topics.is_empty()
    }
}

/// Turns raw passage text into concepts and topics (typically an LLM call).
pub trait Extractor {
    fn extract(&self, text: &str, passage_id: &str) -> Result<ExtractedElements, MemoryError>;
}

/// Extract a passage and fold it into the graph.
///
/// A failed extraction leaves the graph untouched and is returned to the
/// caller, so "nothing extracted" stays distinguishable from "extraction failed".
pub fn ingest<E: Extractor + ?Sized>(
    graph: &mut MemoryGraph,
    extractor: &E,
    text: &str,
    passage_id: &str,
) -> Result<ExtractedElements, MemoryError> {
    let elements = extractor.extract(text, passage_id).inspect_err(|e| {
        warn!(passage_id, error = %e, "extraction failed, graph not updated");
    })?;
    graph.incremental_update(&elements, passage_id);
    Ok(elements)
}

fn labels(value: Option<&Value>, field: &str) -> Result<Vec<String>, MemoryError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(MemoryError::Extraction(format!(
                "{} must be an array (got {})",
                field,
                kind(other)
            )));
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(label) = item else {
            return Err(MemoryError::Extraction(format!(
                "{} entries must be strings (got {})",
                field,
                kind(item)
            )));
        };
        let label = label.trim();
        if !label.is_empty() {
            out.push(label.to_string());
        }
    }
    Ok(out)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
