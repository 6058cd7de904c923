//! Query Classifier
//!
//! Decides whether a user query is answered directly or routed to one of the
//! analysis workflows. Output validation is strict: [`ClassificationResult::from_value`]
//! is the only way raw classifier output becomes a typed result.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::history::{render_turns, ConversationHistory, Turn};
use super::llm_client::LlmClient;
use crate::error::ClassifyError;

const CLASSIFIER_SYSTEM_PROMPT: &str = include_str!("prompts/classifier_system.md");

/// What the classifier decided to do with the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClassificationAction {
    /// Answer from conversation context; no workflow
    Answer,
    /// Run a workflow. The type is kept as the classifier spelled it; the
    /// router decides whether it names a known variant.
    TriggerWorkflow {
        workflow_type: String,
        entities: Vec<String>,
    },
}

/// Validated classifier decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    #[serde(flatten)]
    pub action: ClassificationAction,
    pub response: String,
}

impl ClassificationResult {
    pub fn answer(response: impl Into<String>) -> Self {
        Self {
            action: ClassificationAction::Answer,
            response: response.into(),
        }
    }

    pub fn trigger(
        workflow_type: impl Into<String>,
        entities: Vec<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            action: ClassificationAction::TriggerWorkflow {
                workflow_type: workflow_type.into(),
                entities,
            },
            response: response.into(),
        }
    }

    pub fn workflow_type(&self) -> Option<&str> {
        match &self.action {
            ClassificationAction::TriggerWorkflow { workflow_type, .. } => Some(workflow_type),
            ClassificationAction::Answer => None,
        }
    }

    pub fn entities(&self) -> &[String] {
        match &self.action {
            ClassificationAction::TriggerWorkflow { entities, .. } => entities,
            ClassificationAction::Answer => &[],
        }
    }

    /// Validate parsed classifier output.
    ///
    /// Rejected as [`ClassifyError::InvalidShape`]:
    /// - anything but a JSON object
    /// - missing, non-string or unknown `action`
    /// - `trigger_workflow` whose `workflow_type` is missing, null, not a string or blank
    /// - `answer` that still names a `workflow_type` or lists `entities`
    /// - `entities` that is neither null nor a list of strings
    /// - `response` that is neither absent, null nor a string
    pub fn from_value(value: &Value) -> Result<Self, ClassifyError> {
        let obj = value.as_object().ok_or_else(|| {
            ClassifyError::InvalidShape(format!("expected a JSON object, got {}", value))
        })?;

        let action = match obj.get("action") {
            None | Some(Value::Null) => {
                return Err(ClassifyError::InvalidShape(
                    "missing 'action' field".to_string(),
                ))
            }
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(ClassifyError::InvalidShape(format!(
                    "'action' must be a string, got {}",
                    other
                )))
            }
        };

        let response = match obj.get("response") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(ClassifyError::InvalidShape(format!(
                    "'response' must be a string, got {}",
                    other
                )))
            }
        };

        match action {
            "answer" => {
                if !matches!(obj.get("workflow_type"), None | Some(Value::Null)) {
                    return Err(ClassifyError::InvalidShape(
                        "'answer' must not carry a 'workflow_type'".to_string(),
                    ));
                }
                if !parse_entities(obj.get("entities"))?.is_empty() {
                    return Err(ClassifyError::InvalidShape(
                        "'answer' must not carry 'entities'".to_string(),
                    ));
                }
                Ok(Self::answer(response))
            }
            "trigger_workflow" => {
                let workflow_type = match obj.get("workflow_type") {
                    Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                    None | Some(Value::Null) => {
                        return Err(ClassifyError::InvalidShape(
                            "'trigger_workflow' without a 'workflow_type'".to_string(),
                        ))
                    }
                    Some(other) => {
                        return Err(ClassifyError::InvalidShape(format!(
                            "'workflow_type' must be a non-empty string, got {}",
                            other
                        )))
                    }
                };
                let entities = parse_entities(obj.get("entities"))?;
                Ok(Self::trigger(workflow_type, entities, response))
            }
            other => Err(ClassifyError::InvalidShape(format!(
                "unknown action '{}'",
                other
            ))),
        }
    }
}

fn parse_entities(value: Option<&Value>) -> Result<Vec<String>, ClassifyError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ClassifyError::InvalidShape(format!("entity must be a string, got {}", item))
                })
            })
            .collect(),
        Some(other) => Err(ClassifyError::InvalidShape(format!(
            "'entities' must be a list, got {}",
            other
        ))),
    }
}

/// Classifier contract consumed by the router
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        query: &str,
        user_id: &str,
    ) -> Result<ClassificationResult, ClassifyError>;
}

/// LLM-backed classifier with per-user conversation context
pub struct LlmClassifier {
    client: Arc<dyn LlmClient>,
    history: Arc<dyn ConversationHistory>,
    history_turns: usize,
}

impl LlmClassifier {
    pub fn new(
        client: Arc<dyn LlmClient>,
        history: Arc<dyn ConversationHistory>,
        history_turns: usize,
    ) -> Self {
        Self {
            client,
            history,
            history_turns,
        }
    }

    fn system_prompt(memories: &str) -> String {
        CLASSIFIER_SYSTEM_PROMPT.replace("{memories}", memories)
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(
        &self,
        query: &str,
        user_id: &str,
    ) -> Result<ClassificationResult, ClassifyError> {
        let turns = self.history.recent(user_id, self.history_turns).await;
        let system_prompt = Self::system_prompt(&render_turns(&turns));
        let user_prompt = format!("Current User Query: {}", query);

        tracing::debug!(
            provider = self.client.provider_name(),
            model = self.client.model_name(),
            history_turns = turns.len(),
            "classifying query"
        );

        let response = self
            .client
            .chat_json(&system_prompt, &user_prompt)
            .await
            .map_err(ClassifyError::Failed)?;

        let value: Value = serde_json::from_str(response.trim()).map_err(|e| {
            ClassifyError::Failed(anyhow!("classifier output is not valid JSON: {}", e))
        })?;
        let result = ClassificationResult::from_value(&value)?;

        self.history.append(user_id, Turn::user(query)).await;
        if !result.response.is_empty() {
            self.history
                .append(user_id, Turn::assistant(result.response.clone()))
                .await;
        }

        Ok(result)
    }
}
