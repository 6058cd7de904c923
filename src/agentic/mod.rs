//! LLM-backed collaborators
//!
//! The router only sees the [`Classifier`] and [`QueryGenerationAgent`] traits.
//! This module also carries the OpenAI-backed implementations of both, the
//! provider-neutral [`LlmClient`] they call through, and the per-user
//! conversation history the classifier reads.

// LLM client abstraction
pub mod llm_client;
pub mod openai_client;

// Collaborators
pub mod classifier;
pub mod history;
pub mod query_generator;

pub use classifier::{ClassificationAction, ClassificationResult, Classifier, LlmClassifier};
pub use history::{ConversationHistory, InMemoryHistory, Turn};
pub use llm_client::LlmClient;
pub use openai_client::OpenAiClient;
pub use query_generator::{LlmQueryGenerator, QueryGenerationAgent};
