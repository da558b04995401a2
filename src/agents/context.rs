// Context agent: short per-chat history

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{Agent, AgentResult};
use crate::communication::Message;

pub const DEFAULT_CHAT_ID: &str = "default";

/// Entries returned as `context`
const CONTEXT_WINDOW: usize = 5;
/// Entries kept per chat; older ones are dropped
const MAX_HISTORY: usize = 50;

#[derive(Default)]
pub struct ContextAgent {
    sessions: Mutex<HashMap<String, VecDeque<String>>>,
}

impl ContextAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_context(&self, chat_id: &str, content: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let history = sessions.entry(chat_id.to_string()).or_default();
        history.push_back(content.to_string());
        while history.len() > MAX_HISTORY {
            history.pop_front();
        }
    }

    /// Full stored history for a chat, oldest first
    pub fn retrieve_context(&self, chat_id: &str) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(chat_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns whether the chat had any history
    pub fn clear_context(&self, chat_id: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(chat_id).is_some()
    }

    fn recent(&self, chat_id: &str) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(chat_id)
            .map(|h| h.iter().skip(h.len().saturating_sub(CONTEXT_WINDOW)).cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, chat_id: &str, text: &str) -> Value {
        debug!(chat_id = %chat_id, "Storing chat context");
        self.store_context(chat_id, text);
        json!({
            "context": self.recent(chat_id),
            "chat_id": chat_id,
            "error": null,
        })
    }
}

/// `... chat_id=abc` selects the chat; everything else goes to the default one
fn chat_id_from_query(query: &str) -> &str {
    query
        .rsplit_once("chat_id=")
        .map(|(_, id)| id.trim())
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_CHAT_ID)
}

#[async_trait]
impl Agent for ContextAgent {
    fn name(&self) -> &str {
        "Context"
    }

    async fn process_query(&self, query: &str) -> AgentResult<Value> {
        Ok(self.record(chat_id_from_query(query), query))
    }

    async fn process_message(&self, message: &Message) -> AgentResult<Value> {
        let chat_id = message
            .content
            .get("chat_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_CHAT_ID);
        Ok(self.record(chat_id, message.text().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_returns_last_five() {
        let agent = ContextAgent::new();
        for i in 0..7 {
            agent.process_query(&format!("q{} chat_id=abc", i)).await.unwrap();
        }

        let result = agent.process_query("q7 chat_id=abc").await.unwrap();
        let context = result["context"].as_array().unwrap();
        assert_eq!(context.len(), 5);
        assert_eq!(context[0], "q3 chat_id=abc");
        assert_eq!(context[4], "q7 chat_id=abc");
        assert_eq!(result["chat_id"], "abc");
        assert!(agent.retrieve_context(DEFAULT_CHAT_ID).is_empty());
    }

    #[test]
    fn test_history_is_capped() {
        let agent = ContextAgent::new();
        for i in 0..(MAX_HISTORY + 10) {
            agent.store_context("c", &i.to_string());
        }
        let history = agent.retrieve_context("c");
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0], "10");
    }

    #[test]
    fn test_clear_context() {
        let agent = ContextAgent::new();
        agent.store_context("c", "hello");
        assert!(agent.clear_context("c"));
        assert!(!agent.clear_context("c"));
        assert!(agent.retrieve_context("c").is_empty());
    }

    #[test]
    fn test_chat_id_from_query() {
        assert_eq!(chat_id_from_query("hello chat_id=42"), "42");
        assert_eq!(chat_id_from_query("hello"), DEFAULT_CHAT_ID);
        assert_eq!(chat_id_from_query("hello chat_id= "), DEFAULT_CHAT_ID);
    }
}
