//! Classification and dispatch router
//!
//! One [`Router::run`] call turns a user query into an ordered [`EventStream`]:
//!
//! ```text
//! Init -> Classifying -> RoutingDecision -> Dispatching(kind) -> Relaying(kind) -> Terminal
//!              \                \                  \                  \
//!               +----------------+------------------+------------------+--> ErrorTerminal
//! ```
//!
//! Every path, including consumer disconnects and panics inside a collaborator,
//! releases the run's graph connection exactly once. Every path the consumer is
//! still around for ends with the `end_router` / `finished` sentinel.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures::FutureExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::agentic::{
    ClassificationAction, Classifier, InMemoryHistory, LlmClassifier, LlmClient,
    LlmQueryGenerator, OpenAiClient, QueryGenerationAgent,
};
use crate::config::RouterConfig;
use crate::error::PipelineError;
use crate::events::{ConsumerGone, EventSink, EventStream, RouterEvent, Step};
use crate::graph::{
    ConnectionGuard, GraphConnector, MarkdownSchemaProvider, Neo4jHttpConnector, SchemaProvider,
};
use crate::workflow::{StageOutcome, WorkflowKind, WorkflowStage};

/// Where a run currently is. Transitions are logged at `debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Classifying,
    RoutingDecision,
    Dispatching(WorkflowKind),
    Relaying(WorkflowKind),
    Terminal,
    ErrorTerminal,
}

/// States one run has passed through, starting at `Init`
#[derive(Debug, Clone, PartialEq, Eq)]
struct StatePath(Vec<RunState>);

impl StatePath {
    fn new() -> Self {
        Self(vec![RunState::Init])
    }

    fn current(&self) -> RunState {
        self.0.last().copied().unwrap_or(RunState::Init)
    }

    fn advance(&mut self, to: RunState) {
        tracing::debug!(from = ?self.current(), to = ?to, "router state transition");
        self.0.push(to);
    }
}

/// Entry point of the engine. Cheap to share; every run owns its own state.
#[derive(Clone)]
pub struct Router {
    connector: Arc<dyn GraphConnector>,
    classifier: Arc<dyn Classifier>,
    insight: Arc<WorkflowStage>,
    optimization: Arc<WorkflowStage>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Wire the OpenAI-backed collaborators, the Neo4j connector and the
    /// markdown schema provider from configuration.
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();

        let classifier_llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::from_model_config(
            api_key.clone(),
            &config.classifier_model,
        ));
        let insight_llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::from_model_config(
            api_key.clone(),
            &config.insight_model,
        ));
        let optimization_llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::from_model_config(
            api_key,
            &config.optimization_model,
        ));

        let schema_provider = match &config.schema_base_dir {
            Some(dir) => MarkdownSchemaProvider::with_base_dir(dir),
            None => MarkdownSchemaProvider::new(),
        };
        let connector =
            Neo4jHttpConnector::from_config(&config.graph).context("invalid graph configuration")?;

        tracing::info!(
            classifier_model = %config.classifier_model.model,
            insight_model = %config.insight_model.model,
            optimization_model = %config.optimization_model.model,
            graph = connector.base_url(),
            "router configured"
        );

        Router::builder()
            .connector(Arc::new(connector))
            .classifier(Arc::new(LlmClassifier::new(
                classifier_llm,
                Arc::new(InMemoryHistory::default()),
                config.history_turns,
            )))
            .schema_provider(Arc::new(schema_provider))
            .insight_agent(Arc::new(LlmQueryGenerator::insight(insight_llm)))
            .optimization_agent(Arc::new(LlmQueryGenerator::optimization(optimization_llm)))
            .insight_schema(config.insight_schema_file.to_string_lossy())
            .optimization_schema(config.optimization_schema_file.to_string_lossy())
            .emit_stage_markers(config.emit_stage_markers)
            .build()
    }

    /// Start a run. Nothing happens (no connection, no classifier call) until
    /// the returned stream is first polled.
    pub fn run(&self, user_query: impl Into<String>, user_id: impl Into<String>) -> EventStream {
        let run = RouterRun {
            run_id: Uuid::new_v4(),
            query: user_query.into(),
            user_id: user_id.into(),
            connector: self.connector.clone(),
            classifier: self.classifier.clone(),
            insight: self.insight.clone(),
            optimization: self.optimization.clone(),
        };
        EventStream::from_producer(move |sink| run.execute(sink))
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("insight", &self.insight)
            .field("optimization", &self.optimization)
            .finish()
    }
}

/// State owned by one run's producer task
struct RouterRun {
    run_id: Uuid,
    query: String,
    user_id: String,
    connector: Arc<dyn GraphConnector>,
    classifier: Arc<dyn Classifier>,
    insight: Arc<WorkflowStage>,
    optimization: Arc<WorkflowStage>,
}

impl RouterRun {
    async fn execute(self, sink: EventSink) {
        let span = tracing::info_span!(
            "router_run",
            run_id = %self.run_id,
            user_id = %self.user_id
        );

        async move {
            // Dropped with the task on cancellation, which closes the session
            let mut guard = ConnectionGuard::empty();

            let driven = AssertUnwindSafe(self.drive(&sink, &mut guard))
                .catch_unwind()
                .await;

            match driven {
                Ok(Ok(path)) => {
                    tracing::info!(
                        final_state = ?path.current(),
                        path = ?path.0,
                        "router run finished"
                    );
                }
                Ok(Err(ConsumerGone)) => {
                    tracing::info!("consumer disconnected; stopping run");
                    guard.release();
                    return;
                }
                Err(panic) => {
                    let err = PipelineError::Unhandled(panic_message(panic.as_ref()));
                    tracing::error!(error = %err, "router run panicked");
                    if sink
                        .emit(RouterEvent::error(err.step(), err.to_string()))
                        .await
                        .is_err()
                    {
                        guard.release();
                        return;
                    }
                }
            }

            guard.release();
            if sink.emit(RouterEvent::finished()).await.is_err() {
                tracing::debug!("consumer gone before the end sentinel");
            }
        }
        .instrument(span)
        .await
    }

    /// Walk the state machine. Returns the states passed through, or
    /// `ConsumerGone` as soon as an emit finds nobody listening.
    async fn drive(
        &self,
        sink: &EventSink,
        guard: &mut ConnectionGuard,
    ) -> Result<StatePath, ConsumerGone> {
        let mut path = StatePath::new();

        match self.connector.acquire().await {
            Ok(session) => guard.attach(session),
            Err(e) => return self.fail(sink, path, e.into()).await,
        }

        path.advance(RunState::Classifying);
        sink.emit(RouterEvent::in_progress(
            Step::ClassifyQuery,
            "Classifying query...",
        ))
        .await?;

        let classification = match self.classifier.classify(&self.query, &self.user_id).await {
            Ok(classification) => classification,
            Err(e) => return self.fail(sink, path, e.into()).await,
        };

        let workflow_type = match classification.action {
            ClassificationAction::Answer => {
                sink.emit(RouterEvent::completed(
                    Step::ClassifyQuery,
                    "Query answered from conversation context.",
                ))
                .await?;
                sink.emit(RouterEvent::answer(classification.response)).await?;
                path.advance(RunState::Terminal);
                return Ok(path);
            }
            ClassificationAction::TriggerWorkflow {
                workflow_type,
                entities,
            } => {
                tracing::debug!(workflow_type = %workflow_type, ?entities, "workflow requested");
                workflow_type
            }
        };

        path.advance(RunState::RoutingDecision);
        sink.emit(RouterEvent::completed(
            Step::ClassifyQuery,
            format!("Query classified for '{}' workflow.", workflow_type),
        ))
        .await?;

        // Unknown types never produce a routing_decision event
        let kind = match workflow_type.parse::<WorkflowKind>() {
            Ok(kind) => kind,
            Err(unknown) => {
                let err = PipelineError::UnknownWorkflowType(unknown.0);
                return self.fail(sink, path, err).await;
            }
        };
        sink.emit(RouterEvent::routing_decision(kind)).await?;

        path.advance(RunState::Dispatching(kind));
        let stage = match kind {
            WorkflowKind::Insight => &self.insight,
            WorkflowKind::Optimization => &self.optimization,
        };

        path.advance(RunState::Relaying(kind));
        match stage.run(&self.query, sink).await? {
            StageOutcome::Completed { count } => {
                tracing::debug!(count, "workflow relayed generated queries");
                path.advance(RunState::Terminal);
            }
            StageOutcome::NoOp => path.advance(RunState::Terminal),
            StageOutcome::Failed(err) => {
                tracing::debug!(kind = err.kind_str(), "workflow stage ended with an error");
                path.advance(RunState::ErrorTerminal);
            }
        }
        Ok(path)
    }

    async fn fail(
        &self,
        sink: &EventSink,
        mut path: StatePath,
        err: PipelineError,
    ) -> Result<StatePath, ConsumerGone> {
        tracing::warn!(
            step = %err.step(),
            kind = err.kind_str(),
            error = %err,
            "router run failed"
        );
        sink.emit(RouterEvent::error(err.step(), err.to_string()))
            .await?;
        path.advance(RunState::ErrorTerminal);
        Ok(path)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Assembles a [`Router`] from its collaborators
#[derive(Default)]
pub struct RouterBuilder {
    connector: Option<Arc<dyn GraphConnector>>,
    classifier: Option<Arc<dyn Classifier>>,
    schema_provider: Option<Arc<dyn SchemaProvider>>,
    insight_agent: Option<Arc<dyn QueryGenerationAgent>>,
    optimization_agent: Option<Arc<dyn QueryGenerationAgent>>,
    insight_schema: Option<String>,
    optimization_schema: Option<String>,
    emit_stage_markers: bool,
}

impl RouterBuilder {
    pub fn connector(mut self, connector: Arc<dyn GraphConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn schema_provider(mut self, provider: Arc<dyn SchemaProvider>) -> Self {
        self.schema_provider = Some(provider);
        self
    }

    pub fn insight_agent(mut self, agent: Arc<dyn QueryGenerationAgent>) -> Self {
        self.insight_agent = Some(agent);
        self
    }

    pub fn optimization_agent(mut self, agent: Arc<dyn QueryGenerationAgent>) -> Self {
        self.optimization_agent = Some(agent);
        self
    }

    /// Schema reference for the insight variant (default `neo4j_schema.md`)
    pub fn insight_schema(mut self, reference: impl Into<String>) -> Self {
        self.insight_schema = Some(reference.into());
        self
    }

    /// Schema reference for the optimization variant (default `neo4j_schema.md`)
    pub fn optimization_schema(mut self, reference: impl Into<String>) -> Self {
        self.optimization_schema = Some(reference.into());
        self
    }

    pub fn emit_stage_markers(mut self, enabled: bool) -> Self {
        self.emit_stage_markers = enabled;
        self
    }

    pub fn build(self) -> Result<Router> {
        let connector = self.connector.ok_or_else(|| anyhow!("router needs a graph connector"))?;
        let classifier = self.classifier.ok_or_else(|| anyhow!("router needs a classifier"))?;
        let schema_provider = self
            .schema_provider
            .ok_or_else(|| anyhow!("router needs a schema provider"))?;
        let insight_agent = self
            .insight_agent
            .ok_or_else(|| anyhow!("router needs an insight query generator"))?;
        let optimization_agent = self
            .optimization_agent
            .ok_or_else(|| anyhow!("router needs an optimization query generator"))?;

        let default_schema = crate::config::DEFAULT_SCHEMA_FILE;
        let insight = WorkflowStage::new(
            WorkflowKind::Insight,
            schema_provider.clone(),
            self.insight_schema.unwrap_or_else(|| default_schema.to_string()),
            insight_agent,
        )
        .with_start_marker(self.emit_stage_markers);
        let optimization = WorkflowStage::new(
            WorkflowKind::Optimization,
            schema_provider,
            self.optimization_schema
                .unwrap_or_else(|| default_schema.to_string()),
            optimization_agent,
        )
        .with_start_marker(self.emit_stage_markers);

        Ok(Router {
            connector,
            classifier,
            insight: Arc::new(insight),
            optimization: Arc::new(optimization),
        })
    }
}
