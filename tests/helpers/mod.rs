//! Scripted collaborators for router integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;
use uuid::Uuid;

use adgraph_router::agentic::{ClassificationResult, Classifier, QueryGenerationAgent};
use adgraph_router::error::{ClassifyError, ConnectionError, GenerationError, SchemaLoadError};
use adgraph_router::graph::{GraphConnector, GraphSession, SchemaProvider};
use adgraph_router::{Router, RouterEvent, Step};

// ============================================================================
// Graph connection
// ============================================================================

#[derive(Default)]
pub struct ConnectionCounters {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl ConnectionCounters {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

pub struct CountingConnector {
    pub counters: Arc<ConnectionCounters>,
    fail: bool,
}

impl CountingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            counters: Arc::new(ConnectionCounters::default()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            counters: Arc::new(ConnectionCounters::default()),
            fail: true,
        })
    }
}

struct CountingSession {
    id: Uuid,
    counters: Arc<ConnectionCounters>,
}

impl GraphSession for CountingSession {
    fn id(&self) -> Uuid {
        self.id
    }

    fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl GraphConnector for CountingConnector {
    async fn acquire(&self) -> Result<Box<dyn GraphSession>, ConnectionError> {
        if self.fail {
            return Err(ConnectionError::Rejected { status: 503 });
        }
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSession {
            id: Uuid::new_v4(),
            counters: self.counters.clone(),
        }))
    }
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Clone)]
pub enum Script {
    Answer(&'static str),
    Trigger(&'static str),
    Fail(&'static str),
    InvalidShape(&'static str),
    Panic,
    /// Never returns; `entered` is notified once the call is in flight
    Hang,
}

pub struct ScriptedClassifier {
    script: Script,
    pub calls: AtomicUsize,
    pub entered: Notify,
}

impl ScriptedClassifier {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
        })
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        _query: &str,
        _user_id: &str,
    ) -> Result<ClassificationResult, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Answer(response) => Ok(ClassificationResult::answer(*response)),
            Script::Trigger(workflow_type) => Ok(ClassificationResult::trigger(
                *workflow_type,
                vec!["cost per click".to_string()],
                "Running the analysis.",
            )),
            Script::Fail(message) => Err(ClassifyError::Failed(anyhow::anyhow!(*message))),
            Script::InvalidShape(message) => Err(ClassifyError::InvalidShape(message.to_string())),
            Script::Panic => panic!("classifier exploded"),
            Script::Hang => {
                self.entered.notify_one();
                std::future::pending().await
            }
        }
    }
}

// ============================================================================
// Schema provider and generation agents
// ============================================================================

pub struct StaticSchema {
    schema: Option<&'static str>,
    pub calls: AtomicUsize,
    pub references: Mutex<Vec<String>>,
}

impl StaticSchema {
    pub fn new(schema: &'static str) -> Arc<Self> {
        Arc::new(Self {
            schema: Some(schema),
            calls: AtomicUsize::new(0),
            references: Mutex::new(Vec::new()),
        })
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(Self {
            schema: None,
            calls: AtomicUsize::new(0),
            references: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SchemaProvider for StaticSchema {
    async fn load(&self, reference: &str) -> Result<String, SchemaLoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.references.lock().unwrap().push(reference.to_string());
        self.schema
            .map(str::to_string)
            .ok_or_else(|| SchemaLoadError::NotFound {
                reference: reference.to_string(),
            })
    }
}

pub struct CannedAgent {
    reply: Result<Value, &'static str>,
    pub calls: AtomicUsize,
}

impl CannedAgent {
    pub fn new(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryGenerationAgent for CannedAgent {
    async fn generate(&self, _query: &str, _schema: &str) -> Result<Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .map_err(|m| GenerationError::Call(anyhow::anyhow!(m)))
    }
}

// ============================================================================
// Fixture
// ============================================================================

pub struct Fixture {
    pub router: Router,
    pub connector: Arc<CountingConnector>,
    pub classifier: Arc<ScriptedClassifier>,
    pub schema: Arc<StaticSchema>,
    pub insight: Arc<CannedAgent>,
    pub optimization: Arc<CannedAgent>,
}

pub struct FixtureBuilder {
    connector: Arc<CountingConnector>,
    classifier: Arc<ScriptedClassifier>,
    schema: Arc<StaticSchema>,
    insight: Arc<CannedAgent>,
    optimization: Arc<CannedAgent>,
    stage_markers: bool,
}

impl FixtureBuilder {
    pub fn new(script: Script) -> Self {
        Self {
            connector: CountingConnector::new(),
            classifier: ScriptedClassifier::new(script),
            schema: StaticSchema::new("(:Campaign)-[:HAS_AD_GROUP]->(:AdGroup {cpc, ctr})"),
            insight: CannedAgent::new(serde_json::json!({"queries": []})),
            optimization: CannedAgent::new(serde_json::json!({"queries": []})),
            stage_markers: false,
        }
    }

    pub fn connector(mut self, connector: Arc<CountingConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn schema(mut self, schema: Arc<StaticSchema>) -> Self {
        self.schema = schema;
        self
    }

    pub fn insight(mut self, agent: Arc<CannedAgent>) -> Self {
        self.insight = agent;
        self
    }

    pub fn optimization(mut self, agent: Arc<CannedAgent>) -> Self {
        self.optimization = agent;
        self
    }

    pub fn stage_markers(mut self) -> Self {
        self.stage_markers = true;
        self
    }

    pub fn build(self) -> Fixture {
        let router = Router::builder()
            .connector(self.connector.clone())
            .classifier(self.classifier.clone())
            .schema_provider(self.schema.clone())
            .insight_agent(self.insight.clone())
            .optimization_agent(self.optimization.clone())
            .optimization_schema("optimization_schema.md")
            .emit_stage_markers(self.stage_markers)
            .build()
            .expect("all collaborators supplied");

        Fixture {
            router,
            connector: self.connector,
            classifier: self.classifier,
            schema: self.schema,
            insight: self.insight,
            optimization: self.optimization,
        }
    }
}

// ============================================================================
// Event assertions
// ============================================================================

/// Compact `type:step:status` rendering for sequence assertions
pub fn signature(event: &RouterEvent) -> String {
    let value = serde_json::to_value(event).unwrap();
    match event {
        RouterEvent::Status { .. } => format!(
            "status:{}:{}",
            value["step"].as_str().unwrap(),
            value["status"].as_str().unwrap()
        ),
        RouterEvent::RoutingDecision { .. } => {
            format!("routing_decision:{}", value["workflowType"].as_str().unwrap())
        }
        RouterEvent::ReasoningSummary { step, .. } => format!("reasoning_summary:{}", step),
        RouterEvent::Answer { .. } => "answer".to_string(),
        RouterEvent::Error { step, .. } => format!("error:{}", step),
    }
}

pub fn signatures(events: &[RouterEvent]) -> Vec<String> {
    events.iter().map(signature).collect()
}

pub fn error_message(events: &[RouterEvent], step: Step) -> Option<String> {
    events.iter().find_map(|e| match e {
        RouterEvent::Error { step: s, message } if *s == step => Some(message.clone()),
        _ => None,
    })
}
