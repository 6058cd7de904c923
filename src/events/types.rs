//! Router event wire model.
//!
//! Every run produces an ordered sequence of [`RouterEvent`]s. The JSON shape is
//! what the transport layer forwards verbatim:
//!
//! | type                | fields                                             |
//! |---------------------|----------------------------------------------------|
//! | `status`            | `step`, `status`, `details?`, `generatedQueries?`  |
//! | `routing_decision`  | `workflowType`                                     |
//! | `reasoning_summary` | `step`, `reasoning`                                |
//! | `answer`            | `response`                                         |
//! | `error`             | `step`, `message`                                  |
//!
//! The last event of every run is the `end_router` / `finished` sentinel.

use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowKind;

/// Pipeline step an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    AcquireConnection,
    ClassifyQuery,
    RouteWorkflow,
    InsightQueryGenStart,
    OptQueryGenStart,
    LoadSchema,
    GenerateQueries,
    RouterException,
    EndRouter,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::AcquireConnection => "acquire_connection",
            Step::ClassifyQuery => "classify_query",
            Step::RouteWorkflow => "route_workflow",
            Step::InsightQueryGenStart => "insight_query_gen_start",
            Step::OptQueryGenStart => "opt_query_gen_start",
            Step::LoadSchema => "load_schema",
            Step::GenerateQueries => "generate_queries",
            Step::RouterException => "router_exception",
            Step::EndRouter => "end_router",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress phase carried by `status` events (wire field `status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InProgress,
    Completed,
    Failed,
    /// Only used by the terminal sentinel
    Finished,
}

/// One generated graph query, ready for downstream execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    /// What the query is meant to find out
    pub objective: String,
    /// Query text in the graph store's query language
    pub query: String,
}

impl GeneratedQuery {
    pub fn new(objective: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            query: query.into(),
        }
    }
}

/// Event emitted by the router and its workflow stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouterEvent {
    /// Progress on a step. The `generate_queries` completion carries the queries.
    Status {
        step: Step,
        status: Phase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        #[serde(
            rename = "generatedQueries",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        generated_queries: Option<Vec<GeneratedQuery>>,
    },

    /// Which workflow variant the query was routed to
    RoutingDecision {
        #[serde(rename = "workflowType")]
        workflow_type: WorkflowKind,
    },

    /// Free-text reasoning returned by a query generator
    ReasoningSummary { step: Step, reasoning: String },

    /// Direct answer from the classifier; no workflow runs
    Answer { response: String },

    /// A domain failure; ends the substantive part of the run
    Error { step: Step, message: String },
}

impl RouterEvent {
    pub fn in_progress(step: Step, details: impl Into<String>) -> Self {
        RouterEvent::Status {
            step,
            status: Phase::InProgress,
            details: Some(details.into()),
            generated_queries: None,
        }
    }

    pub fn completed(step: Step, details: impl Into<String>) -> Self {
        RouterEvent::Status {
            step,
            status: Phase::Completed,
            details: Some(details.into()),
            generated_queries: None,
        }
    }

    /// `generate_queries` completion; an empty list is a no-op success
    pub fn queries_generated(queries: Vec<GeneratedQuery>, details: impl Into<String>) -> Self {
        RouterEvent::Status {
            step: Step::GenerateQueries,
            status: Phase::Completed,
            details: Some(details.into()),
            generated_queries: Some(queries),
        }
    }

    /// The terminal sentinel
    pub fn finished() -> Self {
        RouterEvent::Status {
            step: Step::EndRouter,
            status: Phase::Finished,
            details: None,
            generated_queries: None,
        }
    }

    pub fn routing_decision(workflow_type: WorkflowKind) -> Self {
        RouterEvent::RoutingDecision { workflow_type }
    }

    pub fn reasoning(step: Step, reasoning: impl Into<String>) -> Self {
        RouterEvent::ReasoningSummary {
            step,
            reasoning: reasoning.into(),
        }
    }

    pub fn answer(response: impl Into<String>) -> Self {
        RouterEvent::Answer {
            response: response.into(),
        }
    }

    pub fn error(step: Step, message: impl Into<String>) -> Self {
        RouterEvent::Error {
            step,
            message: message.into(),
        }
    }

    /// Get the event type as it appears on the wire
    pub fn event_type_str(&self) -> &'static str {
        match self {
            RouterEvent::Status { .. } => "status",
            RouterEvent::RoutingDecision { .. } => "routing_decision",
            RouterEvent::ReasoningSummary { .. } => "reasoning_summary",
            RouterEvent::Answer { .. } => "answer",
            RouterEvent::Error { .. } => "error",
        }
    }

    /// Step of the event, if it has one (`routing_decision` and `answer` do not)
    pub fn step(&self) -> Option<Step> {
        match self {
            RouterEvent::Status { step, .. }
            | RouterEvent::ReasoningSummary { step, .. }
            | RouterEvent::Error { step, .. } => Some(*step),
            RouterEvent::RoutingDecision { .. } | RouterEvent::Answer { .. } => None,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            RouterEvent::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == Some(Phase::Finished)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RouterEvent::Error { .. })
    }

    pub fn generated_queries(&self) -> Option<&[GeneratedQuery]> {
        match self {
            RouterEvent::Status {
                generated_queries: Some(queries),
                ..
            } => Some(queries),
            _ => None,
        }
    }
}
