//! Shared query-generation stage
//!
//! One parameterized pipeline serves both workflow variants:
//!
//! ```text
//! [start marker] -> load_schema -> generate_queries -> [reasoning_summary]
//! ```
//!
//! Every failure is reported as exactly one `Error` event and stops the stage.
//! The stage never emits the terminal sentinel; the router owns that.

use std::sync::Arc;

use tracing::instrument;

use super::generation::GenerationResult;
use super::kind::WorkflowKind;
use crate::agentic::QueryGenerationAgent;
use crate::error::PipelineError;
use crate::events::{ConsumerGone, EventSink, GeneratedQuery, RouterEvent, Step};
use crate::graph::SchemaProvider;

/// How a stage run ended, once its events are out
#[derive(Debug)]
pub enum StageOutcome {
    /// Queries were generated and emitted
    Completed { count: usize },
    /// The agent had nothing to generate; an empty completion was emitted
    NoOp,
    /// An `Error` event was emitted for this failure
    Failed(PipelineError),
}

/// A workflow variant wired to its schema source and generation agent
pub struct WorkflowStage {
    kind: WorkflowKind,
    schema_provider: Arc<dyn SchemaProvider>,
    schema_reference: String,
    agent: Arc<dyn QueryGenerationAgent>,
    emit_start_marker: bool,
}

impl WorkflowStage {
    pub fn new(
        kind: WorkflowKind,
        schema_provider: Arc<dyn SchemaProvider>,
        schema_reference: impl Into<String>,
        agent: Arc<dyn QueryGenerationAgent>,
    ) -> Self {
        Self {
            kind,
            schema_provider,
            schema_reference: schema_reference.into(),
            agent,
            emit_start_marker: false,
        }
    }

    /// Emit `insight_query_gen_start` / `opt_query_gen_start` before loading the schema
    pub fn with_start_marker(mut self, enabled: bool) -> Self {
        self.emit_start_marker = enabled;
        self
    }

    /// Run the stage, emitting its events into `sink`.
    ///
    /// Returns `Err(ConsumerGone)` only when the consumer disconnected; domain
    /// failures come back as [`StageOutcome::Failed`] after their `Error` event.
    #[instrument(skip_all, fields(workflow = %self.kind))]
    pub async fn run(&self, query: &str, sink: &EventSink) -> Result<StageOutcome, ConsumerGone> {
        if self.emit_start_marker {
            sink.emit(RouterEvent::in_progress(
                self.kind.start_step(),
                format!("Starting {} workflow...", self.kind),
            ))
            .await?;
        }

        sink.emit(RouterEvent::in_progress(
            Step::LoadSchema,
            "Loading graph schema...",
        ))
        .await?;

        let schema = match self.schema_provider.load(&self.schema_reference).await {
            Ok(schema) => schema,
            Err(e) => return self.fail(sink, e.into()).await,
        };
        tracing::debug!(
            reference = %self.schema_reference,
            bytes = schema.len(),
            "schema loaded"
        );

        sink.emit(RouterEvent::completed(Step::LoadSchema, "Schema loaded."))
            .await?;
        sink.emit(RouterEvent::in_progress(
            Step::GenerateQueries,
            "Generating Cypher queries...",
        ))
        .await?;

        let (queries, reasoning) = match self.generate(query, &schema).await {
            Ok(generated) => generated,
            Err(e) => return self.fail(sink, e).await,
        };

        if queries.is_empty() {
            tracing::info!("query generator returned no queries");
            sink.emit(RouterEvent::queries_generated(
                Vec::new(),
                "No queries were generated for this request.",
            ))
            .await?;
            return Ok(StageOutcome::NoOp);
        }

        let count = queries.len();
        tracing::info!(count, "queries generated");
        sink.emit(RouterEvent::queries_generated(
            queries,
            format!("Generated {} Cypher query(s).", count),
        ))
        .await?;

        if let Some(reasoning) = reasoning {
            sink.emit(RouterEvent::reasoning(Step::GenerateQueries, reasoning))
                .await?;
        }

        Ok(StageOutcome::Completed { count })
    }

    async fn generate(
        &self,
        query: &str,
        schema: &str,
    ) -> Result<(Vec<GeneratedQuery>, Option<String>), PipelineError> {
        let raw = self.agent.generate(query, schema).await?;
        let result = GenerationResult::from_value(&raw)?;
        let reasoning = result.reasoning().map(str::to_string);
        let queries = self.kind.normalize(result.queries)?;
        Ok((queries, reasoning))
    }

    async fn fail(
        &self,
        sink: &EventSink,
        err: PipelineError,
    ) -> Result<StageOutcome, ConsumerGone> {
        tracing::warn!(
            step = %err.step(),
            kind = err.kind_str(),
            error = %err,
            "workflow stage failed"
        );
        sink.emit(RouterEvent::error(err.step(), err.to_string()))
            .await?;
        Ok(StageOutcome::Failed(err))
    }
}

impl std::fmt::Debug for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowStage")
            .field("kind", &self.kind)
            .field("schema_reference", &self.schema_reference)
            .field("emit_start_marker", &self.emit_start_marker)
            .finish()
    }
}
