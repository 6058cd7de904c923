//! Query Generation Agents
//!
//! Turn a user query plus the graph schema into generated graph queries. Agents
//! return the parsed JSON object as-is; checking its shape is the workflow
//! stage's job (see [`GenerationResult`](crate::workflow::GenerationResult)).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::llm_client::LlmClient;
use crate::error::GenerationError;
use crate::workflow::WorkflowKind;

const INSIGHT_SYSTEM_PROMPT: &str = include_str!("prompts/insight_query_system.md");
const OPTIMIZATION_SYSTEM_PROMPT: &str = include_str!("prompts/optimization_query_system.md");

/// Query generation contract consumed by workflow stages
#[async_trait]
pub trait QueryGenerationAgent: Send + Sync {
    async fn generate(&self, query: &str, schema: &str) -> Result<Value, GenerationError>;
}

/// LLM-backed generator for one workflow variant
pub struct LlmQueryGenerator {
    client: Arc<dyn LlmClient>,
    kind: WorkflowKind,
}

impl LlmQueryGenerator {
    /// Generator returning bare query strings
    pub fn insight(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            kind: WorkflowKind::Insight,
        }
    }

    /// Generator returning `{objective, query}` objects
    pub fn optimization(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            kind: WorkflowKind::Optimization,
        }
    }

    fn system_prompt(&self, schema: &str) -> String {
        let template = match self.kind {
            WorkflowKind::Insight => INSIGHT_SYSTEM_PROMPT,
            WorkflowKind::Optimization => OPTIMIZATION_SYSTEM_PROMPT,
        };
        template.replace("{schema}", schema)
    }

    fn user_prompt(&self, query: &str) -> String {
        match self.kind {
            WorkflowKind::Insight => format!("Question: {}", query),
            WorkflowKind::Optimization => format!("Optimization request: {}", query),
        }
    }
}

#[async_trait]
impl QueryGenerationAgent for LlmQueryGenerator {
    async fn generate(&self, query: &str, schema: &str) -> Result<Value, GenerationError> {
        tracing::debug!(
            workflow = %self.kind,
            provider = self.client.provider_name(),
            model = self.client.model_name(),
            "generating graph queries"
        );

        let response = self
            .client
            .chat_json(&self.system_prompt(schema), &self.user_prompt(query))
            .await
            .map_err(GenerationError::Call)?;

        Ok(serde_json::from_str(response.trim())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    struct CannedLlm {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl CannedLlm {
        fn new(reply: std::result::Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> anyhow::Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            self.reply.clone().map_err(|e| anyhow!(e))
        }

        fn model_name(&self) -> &str {
            "canned"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    async fn test_insight_prompt_carries_schema_and_query() {
        let llm = CannedLlm::new(Ok(r#"{"queries": ["MATCH (a:AdGroup) RETURN a"]}"#));
        let agent = LlmQueryGenerator::insight(llm.clone());

        let value = agent
            .generate("Which ad groups have the highest CPC?", "(:AdGroup {cpc})")
            .await
            .unwrap();
        assert_eq!(value["queries"][0], "MATCH (a:AdGroup) RETURN a");

        let seen = llm.seen.lock().unwrap();
        assert!(seen[0].0.contains("(:AdGroup {cpc})"));
        assert!(seen[0].0.contains("Insight Query Generator"));
        assert!(seen[0].1.contains("highest CPC"));
    }

    #[tokio::test]
    async fn test_optimization_uses_its_own_prompt() {
        let llm = CannedLlm::new(Ok(r#"{"queries": []}"#));
        let agent = LlmQueryGenerator::optimization(llm.clone());

        agent.generate("Lower my spend", "schema").await.unwrap();
        let seen = llm.seen.lock().unwrap();
        assert!(seen[0].0.contains("Optimization Query Generator"));
        assert!(!seen[0].0.contains("{schema}"));
    }

    #[tokio::test]
    async fn test_non_json_output_is_parse_error() {
        let llm = CannedLlm::new(Ok("```cypher\nMATCH (n) RETURN n\n```"));
        let agent = LlmQueryGenerator::insight(llm);

        let err = agent.generate("q", "schema").await.unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
    }

    #[tokio::test]
    async fn test_call_failure() {
        let llm = CannedLlm::new(Err("request timed out"));
        let agent = LlmQueryGenerator::optimization(llm);

        let err = agent.generate("q", "schema").await.unwrap_err();
        assert!(matches!(err, GenerationError::Call(_)));
        assert!(err.to_string().contains("timed out"));
    }
}
