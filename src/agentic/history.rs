//! Conversation history
//!
//! Recent turns per user, rendered into the classifier prompt so follow-up
//! questions can be answered directly. History is context for the classifier,
//! not a cache: no classification is ever replayed from it.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Who said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Assistant => write!(f, "assistant"),
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// Per-user conversation store. Must tolerate concurrent runs.
#[async_trait]
pub trait ConversationHistory: Send + Sync {
    /// Up to `limit` most recent turns, oldest first
    async fn recent(&self, user_id: &str, limit: usize) -> Vec<Turn>;

    async fn append(&self, user_id: &str, turn: Turn);
}

/// Bounded in-process history.
#[derive(Debug)]
pub struct InMemoryHistory {
    turns: RwLock<HashMap<String, Vec<Turn>>>,
    max_turns: usize,
}

impl InMemoryHistory {
    /// Keep at most `max_turns` turns per user
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new(50)
    }
}

#[async_trait]
impl ConversationHistory for InMemoryHistory {
    async fn recent(&self, user_id: &str, limit: usize) -> Vec<Turn> {
        let turns = self.turns.read().await;
        match turns.get(user_id) {
            Some(list) => {
                let start = list.len().saturating_sub(limit);
                list[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    async fn append(&self, user_id: &str, turn: Turn) {
        let mut turns = self.turns.write().await;
        let list = turns.entry(user_id.to_string()).or_default();
        list.push(turn);
        if list.len() > self.max_turns {
            let excess = list.len() - self.max_turns;
            list.drain(..excess);
        }
    }
}

/// Render turns as `speaker: text` lines for a prompt
pub fn render_turns(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "(no previous conversation)".to_string();
    }
    turns
        .iter()
        .map(|t| format!("{}: {}", t.speaker, t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recent_returns_tail_in_order() {
        let history = InMemoryHistory::new(10);
        for i in 0..5 {
            history.append("u1", Turn::user(format!("q{}", i))).await;
        }

        let recent = history.recent("u1", 2).await;
        assert_eq!(recent, vec![Turn::user("q3"), Turn::user("q4")]);
        assert!(history.recent("someone-else", 2).await.is_empty());
    }

    #[tokio::test]
    async fn test_store_is_bounded() {
        let history = InMemoryHistory::new(3);
        for i in 0..7 {
            history.append("u1", Turn::assistant(format!("a{}", i))).await;
        }

        let all = history.recent("u1", 100).await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].text, "a4");
    }

    #[test]
    fn test_render_turns() {
        assert_eq!(render_turns(&[]), "(no previous conversation)");

        let rendered = render_turns(&[
            Turn::user("Show me CTR for Summer Sale"),
            Turn::assistant("It was 2.5%."),
        ]);
        assert_eq!(
            rendered,
            "user: Show me CTR for Summer Sale\nassistant: It was 2.5%."
        );
    }
}
