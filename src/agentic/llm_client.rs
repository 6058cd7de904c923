//! LLM Client Trait
//!
//! Provider-neutral interface used by the classifier and the query generators.

use anyhow::Result;
use async_trait::async_trait;

/// Unified LLM client interface
///
/// Implementations must be safe to share across concurrent router runs.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Call the LLM expecting a single JSON object back
    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Get the model name for logging
    fn model_name(&self) -> &str;

    /// Get the provider name for logging
    fn provider_name(&self) -> &str;
}
