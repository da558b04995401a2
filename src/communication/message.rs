// Bus message types

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Process-wide logical clock for message ordering
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Caller-assigned identity of an agent on the bus
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: String,
    pub recipient: AgentId,
    pub content: Value,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
}

impl Message {
    pub fn new(sender: impl Into<String>, recipient: AgentId, content: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            recipient,
            content,
            timestamp: Utc::now(),
            sequence: SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// `content.text`, when the content carries one
    pub fn text(&self) -> Option<&str> {
        self.content.get("text").and_then(Value::as_str)
    }
}

/// Reply to a single message: either a result or an error string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
    pub agent: AgentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn success(message_id: Uuid, agent: AgentId, result: Value) -> Self {
        Self {
            message_id: Some(message_id),
            agent,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(message_id: Option<Uuid>, agent: AgentId, error: impl Into<String>) -> Self {
        Self {
            message_id,
            agent,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Value, String> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }

    /// The result, or `{"error": ..}` in its place
    pub fn into_payload(self) -> Value {
        match self.into_result() {
            Ok(value) => value,
            Err(error) => serde_json::json!({ "error": error }),
        }
    }
}
