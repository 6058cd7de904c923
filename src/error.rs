//! Error handling for the classification and dispatch pipeline
//!
//! Collaborator boundaries each get their own error enum. The router folds every
//! one of them into [`PipelineError`], which knows which [`Step`] its `Error` event
//! belongs to. Transport-level clients (LLM and graph HTTP calls) stay on
//! `anyhow::Result` and are converted at the stage boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::events::Step;

/// Umbrella error for one router run.
///
/// Every variant is rendered into exactly one `Error { step, message }` event;
/// none of them ever reach the transport layer as a failed stream.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed during classifier execution: {0}")]
    Classification(String),

    #[error("Classifier returned an invalid output structure: {0}")]
    InvalidClassificationShape(String),

    #[error("Unknown workflow type: {0}")]
    UnknownWorkflowType(String),

    #[error("Failed to load schema: {0}")]
    SchemaLoad(#[from] SchemaLoadError),

    #[error("Failed to get query generator result: {0}")]
    QueryGeneration(String),

    #[error("Query generator returned an invalid output structure: {0}")]
    InvalidGenerationShape(String),

    #[error("Failed to acquire graph connection: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Router error: {0}")]
    Unhandled(String),
}

impl PipelineError {
    /// The step whose `Error` event reports this failure
    pub fn step(&self) -> Step {
        match self {
            PipelineError::Classification(_) | PipelineError::InvalidClassificationShape(_) => {
                Step::ClassifyQuery
            }
            PipelineError::UnknownWorkflowType(_) => Step::RouteWorkflow,
            PipelineError::SchemaLoad(_) => Step::LoadSchema,
            PipelineError::QueryGeneration(_) | PipelineError::InvalidGenerationShape(_) => {
                Step::GenerateQueries
            }
            PipelineError::Connection(_) => Step::AcquireConnection,
            PipelineError::Unhandled(_) => Step::RouterException,
        }
    }

    /// Short kind name for structured logs
    pub fn kind_str(&self) -> &'static str {
        match self {
            PipelineError::Classification(_) => "classification_error",
            PipelineError::InvalidClassificationShape(_) => "invalid_classification_shape",
            PipelineError::UnknownWorkflowType(_) => "unknown_workflow_type",
            PipelineError::SchemaLoad(_) => "schema_load_error",
            PipelineError::QueryGeneration(_) => "query_generation_error",
            PipelineError::InvalidGenerationShape(_) => "invalid_generation_shape",
            PipelineError::Connection(_) => "connection_error",
            PipelineError::Unhandled(_) => "unhandled_exception",
        }
    }
}

/// Failures of the [`Classifier`](crate::agentic::Classifier) collaborator
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// The call could not be completed or its output was not parseable
    #[error("{0:#}")]
    Failed(anyhow::Error),

    /// Parsed output lacks `action` or declares a workflow without a usable type
    #[error("{0}")]
    InvalidShape(String),
}

impl From<ClassifyError> for PipelineError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::Failed(e) => PipelineError::Classification(format!("{:#}", e)),
            ClassifyError::InvalidShape(msg) => PipelineError::InvalidClassificationShape(msg),
        }
    }
}

/// Failures of a [`QueryGenerationAgent`](crate::agentic::QueryGenerationAgent)
/// or of validating what it returned
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("{0:#}")]
    Call(anyhow::Error),

    #[error("failed to parse query generator output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidShape(String),
}

impl From<GenerationError> for PipelineError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::InvalidShape(msg) => PipelineError::InvalidGenerationShape(msg),
            other => PipelineError::QueryGeneration(other.to_string()),
        }
    }
}

/// Failures of a [`SchemaProvider`](crate::graph::SchemaProvider)
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    #[error("schema file '{reference}' not found")]
    NotFound { reference: String },

    #[error("schema file '{path}' could not be read: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema file '{path}' is empty")]
    Empty { path: PathBuf },

    #[error("schema provider failed: {0}")]
    Provider(String),
}

/// Failures acquiring the per-run graph connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("graph connection is not configured: {0}")]
    NotConfigured(String),

    #[error("graph endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("graph endpoint rejected the connection with status {status}")]
    Rejected { status: u16 },

    #[error("graph connector failed: {0}")]
    Connector(String),
}

/// Configuration errors raised while reading the environment
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Missing required setting {0}")]
    Missing(String),
}
