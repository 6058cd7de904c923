//! Workflow variants
//!
//! Insight and optimization share one pipeline. They differ only in the agent
//! and schema reference they are wired with, the entry shape their generator
//! returns, and the label of their "workflow started" marker.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::generation::QueryEntry;
use crate::error::GenerationError;
use crate::events::{GeneratedQuery, Step};

/// Analysis pipeline a query is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowKind {
    Insight,
    Optimization,
}

/// The classifier named a workflow the router does not know
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown workflow type: {0}")]
pub struct UnknownWorkflowType(pub String);

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Insight => "insight",
            WorkflowKind::Optimization => "optimization",
        }
    }

    /// Step label of the variant's "workflow started" marker
    pub fn start_step(&self) -> Step {
        match self {
            WorkflowKind::Insight => Step::InsightQueryGenStart,
            WorkflowKind::Optimization => Step::OptQueryGenStart,
        }
    }

    /// Turn generator entries into completed queries.
    ///
    /// Insight accepts bare query strings and labels them `Insight Query N`.
    /// Optimization accepts only `{objective, query}` objects. A wrong entry
    /// shape or a blank field is an invalid generation shape.
    pub fn normalize(
        &self,
        entries: Vec<QueryEntry>,
    ) -> Result<Vec<GeneratedQuery>, GenerationError> {
        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| self.normalize_entry(index, entry))
            .collect()
    }

    fn normalize_entry(
        &self,
        index: usize,
        entry: QueryEntry,
    ) -> Result<GeneratedQuery, GenerationError> {
        let normalized = match (self, entry) {
            (WorkflowKind::Insight, QueryEntry::Bare(query)) => {
                GeneratedQuery::new(format!("Insight Query {}", index + 1), query)
            }
            (WorkflowKind::Optimization, QueryEntry::Shaped(query)) => query,
            (WorkflowKind::Insight, QueryEntry::Shaped(_)) => {
                return Err(GenerationError::InvalidShape(format!(
                    "insight query {} is an object; expected a query string",
                    index + 1
                )))
            }
            (WorkflowKind::Optimization, QueryEntry::Bare(_)) => {
                return Err(GenerationError::InvalidShape(format!(
                    "optimization query {} is a bare string; expected {{objective, query}}",
                    index + 1
                )))
            }
        };

        if normalized.objective.trim().is_empty() {
            return Err(GenerationError::InvalidShape(format!(
                "query {} has an empty objective",
                index + 1
            )));
        }
        if normalized.query.trim().is_empty() {
            return Err(GenerationError::InvalidShape(format!(
                "query {} has an empty query text",
                index + 1
            )));
        }
        Ok(normalized)
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = UnknownWorkflowType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "insight" => Ok(WorkflowKind::Insight),
            "optimization" => Ok(WorkflowKind::Optimization),
            _ => Err(UnknownWorkflowType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_str() {
        assert_eq!("insight".parse::<WorkflowKind>().unwrap(), WorkflowKind::Insight);
        assert_eq!(
            " Optimization ".parse::<WorkflowKind>().unwrap(),
            WorkflowKind::Optimization
        );
        assert_eq!(
            "forecast".parse::<WorkflowKind>().unwrap_err(),
            UnknownWorkflowType("forecast".to_string())
        );
    }

    #[test]
    fn test_start_steps_differ() {
        assert_eq!(WorkflowKind::Insight.start_step(), Step::InsightQueryGenStart);
        assert_eq!(WorkflowKind::Optimization.start_step(), Step::OptQueryGenStart);
    }

    #[test]
    fn test_insight_labels_bare_strings() {
        let queries = WorkflowKind::Insight
            .normalize(vec![
                QueryEntry::Bare("MATCH (a) RETURN a".into()),
                QueryEntry::Bare("MATCH (b) RETURN b".into()),
            ])
            .unwrap();

        assert_eq!(queries[0], GeneratedQuery::new("Insight Query 1", "MATCH (a) RETURN a"));
        assert_eq!(queries[1].objective, "Insight Query 2");
    }

    #[test]
    fn test_optimization_keeps_agent_objectives() {
        let queries = WorkflowKind::Optimization
            .normalize(vec![QueryEntry::Shaped(GeneratedQuery::new(
                "Find high-CPC ad groups",
                "MATCH (g:AdGroup) RETURN g",
            ))])
            .unwrap();

        assert_eq!(queries[0].objective, "Find high-CPC ad groups");
    }

    #[test]
    fn test_wrong_entry_shape_rejected() {
        let err = WorkflowKind::Optimization
            .normalize(vec![QueryEntry::Bare("MATCH (n) RETURN n".into())])
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidShape(_)));

        let err = WorkflowKind::Insight
            .normalize(vec![QueryEntry::Shaped(GeneratedQuery::new("o", "q"))])
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidShape(_)));
    }

    #[test]
    fn test_blank_fields_rejected() {
        let err = WorkflowKind::Insight
            .normalize(vec![QueryEntry::Bare("   ".into())])
            .unwrap_err();
        assert!(err.to_string().contains("empty query text"));

        let err = WorkflowKind::Optimization
            .normalize(vec![QueryEntry::Shaped(GeneratedQuery::new("", "MATCH (n) RETURN n"))])
            .unwrap_err();
        assert!(err.to_string().contains("empty objective"));
    }

    proptest! {
        #[test]
        fn prop_insight_objectives_are_sequential_and_non_empty(
            queries in proptest::collection::vec("[A-Za-z][A-Za-z0-9 ()]{0,40}", 0..12)
        ) {
            let entries = queries.iter().cloned().map(QueryEntry::Bare).collect();
            let normalized = WorkflowKind::Insight.normalize(entries).unwrap();

            prop_assert_eq!(normalized.len(), queries.len());
            for (i, q) in normalized.iter().enumerate() {
                prop_assert_eq!(&q.objective, &format!("Insight Query {}", i + 1));
                prop_assert_eq!(&q.query, &queries[i]);
                prop_assert!(!q.query.trim().is_empty());
            }
        }
    }
}
