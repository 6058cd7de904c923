//! Query generator output validation
//!
//! One strict parser for what a [`QueryGenerationAgent`](crate::agentic::QueryGenerationAgent)
//! returns. A missing `queries` field is a shape error, never an empty result.

use serde_json::Value;

use crate::error::GenerationError;
use crate::events::GeneratedQuery;

/// One entry of the `queries` list as the agent returned it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEntry {
    /// A bare query string (insight variant)
    Bare(String),
    /// An `{objective, query}` object (optimization variant)
    Shaped(GeneratedQuery),
}

/// Validated generator output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub queries: Vec<QueryEntry>,
    pub reasoning: Option<String>,
}

impl GenerationResult {
    /// Validate a parsed generator response.
    ///
    /// Requires an object with a `queries` list whose entries are strings or
    /// objects carrying string `objective` and `query` fields. `reasoning` may be
    /// absent, null or a string.
    pub fn from_value(value: &Value) -> Result<Self, GenerationError> {
        let obj = value.as_object().ok_or_else(|| {
            GenerationError::InvalidShape(format!("expected a JSON object, got {}", value))
        })?;

        let items = match obj.get("queries") {
            None => {
                return Err(GenerationError::InvalidShape(
                    "missing 'queries' field".to_string(),
                ))
            }
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(GenerationError::InvalidShape(format!(
                    "'queries' field is not a list: {}",
                    other
                )))
            }
        };

        let queries = items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_entry(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        let reasoning = match obj.get("reasoning") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(GenerationError::InvalidShape(format!(
                    "'reasoning' must be a string, got {}",
                    other
                )))
            }
        };

        Ok(Self { queries, reasoning })
    }

    /// Reasoning worth surfacing: present and not blank. Returned verbatim.
    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning
            .as_deref()
            .filter(|r| !r.trim().is_empty())
    }
}

fn parse_entry(index: usize, item: &Value) -> Result<QueryEntry, GenerationError> {
    match item {
        Value::String(query) => Ok(QueryEntry::Bare(query.clone())),
        Value::Object(fields) => {
            let field = |name: &str| {
                fields
                    .get(name)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        GenerationError::InvalidShape(format!(
                            "query {} is missing a string '{}' field",
                            index + 1,
                            name
                        ))
                    })
            };
            Ok(QueryEntry::Shaped(GeneratedQuery {
                objective: field("objective")?,
                query: field("query")?,
            }))
        }
        other => Err(GenerationError::InvalidShape(format!(
            "query {} must be a string or an object, got {}",
            index + 1,
            other
        ))),
    }
}
