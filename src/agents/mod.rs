//! Agent System
//!
//! The research agents that do the actual work behind the message bus and the
//! orchestrator:
//!
//! - **Scholar Agent**: searches CrossRef (plus Semantic Scholar and arXiv) and summarizes
//! - **FactCheck Agent**: scores a claim by academic and news coverage
//! - **Citation Agent**: formats APA / MLA / IEEE citations from CrossRef metadata
//! - **Context Agent**: keeps a short per-chat history
//!
//! ## Contract
//!
//! ```text
//!   Message { content: {"text": ..} }
//!        │
//!        ▼  process_message (default: forwards content.text)
//!   process_query(&str) ──► Ok(Value) | Err(AgentError)
//! ```
//!
//! Every agent is `Send + Sync` and shared behind an `Arc`; the bus runs one
//! worker per agent and the orchestrator fans queries out concurrently.

pub mod scholar;
pub mod factcheck;
pub mod citation;
pub mod context;

pub use citation::{format_citation, CitationAgent, CitationStyle};
pub use context::{ContextAgent, DEFAULT_CHAT_ID};
pub use factcheck::{FactCheckAgent, VERIFIED_THRESHOLD};
pub use scholar::ScholarAgent;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::communication::{AgentId, Message};
use crate::search::{CrossRefClient, SearchError};
use crate::types::AppResult;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{agent} does not support {operation}")]
    Unsupported { agent: String, operation: &'static str },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Internal agent error: {0}")]
    Internal(String),

    /// Failure reported by the agent itself; the text reaches callers verbatim
    #[error("{0}")]
    Failed(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// A research agent reachable through the bus or the orchestrator
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn process_query(&self, _query: &str) -> AgentResult<Value> {
        Err(AgentError::Unsupported {
            agent: self.name().to_string(),
            operation: "process_query",
        })
    }

    /// Bus entry point; forwards `content.text` to `process_query` unless overridden
    async fn process_message(&self, message: &Message) -> AgentResult<Value> {
        let text = message.text().unwrap_or_default();
        self.process_query(text).await
    }
}

/// Validates another agent's result before it reaches a report
#[async_trait]
pub trait FactChecker: Send + Sync {
    async fn verify_information(&self, role: AgentRole, data: Value) -> AgentResult<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentRole {
    Scholar,
    FactCheck,
    Context,
    Citation,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Scholar,
        AgentRole::FactCheck,
        AgentRole::Context,
        AgentRole::Citation,
    ];

    /// Also the bus id the default wiring registers the agent under
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Scholar => "Scholar",
            AgentRole::FactCheck => "FactCheck",
            AgentRole::Context => "Context",
            AgentRole::Citation => "Citation",
        }
    }

    pub fn agent_id(&self) -> AgentId {
        AgentId::from(self.as_str())
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentRole::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AgentError::InvalidInput(format!("Unknown agent role: {}", s)))
    }
}

/// The error carried by an agent payload, if any.
///
/// `null`, a missing key and an empty string all count as "no error".
pub fn payload_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The four research agents built from one configuration
#[derive(Clone)]
pub struct ResearchAgents {
    pub scholar: Arc<ScholarAgent>,
    pub factcheck: Arc<FactCheckAgent>,
    pub citation: Arc<CitationAgent>,
    pub context: Arc<ContextAgent>,
}

impl ResearchAgents {
    pub fn from_config(config: &crate::config::Config) -> AppResult<Self> {
        let crossref = Arc::new(CrossRefClient::from_config(&config.search)?);
        let scholar = ScholarAgent::from_config(config, Arc::clone(&crossref))?;
        let factcheck = FactCheckAgent::from_config(&config.search, Arc::clone(&crossref))?;
        let citation = CitationAgent::new(crossref, config.search.max_results);

        info!(
            llm_summaries = scholar.has_llm(),
            news_coverage = factcheck.has_news(),
            "Research agents initialized"
        );

        Ok(Self {
            scholar: Arc::new(scholar),
            factcheck: Arc::new(factcheck),
            citation: Arc::new(citation),
            context: Arc::new(ContextAgent::new()),
        })
    }

    pub fn get(&self, role: AgentRole) -> Arc<dyn Agent> {
        match role {
            AgentRole::Scholar => self.scholar.clone(),
            AgentRole::FactCheck => self.factcheck.clone(),
            AgentRole::Context => self.context.clone(),
            AgentRole::Citation => self.citation.clone(),
        }
    }

    /// Role routes for the orchestrator
    pub fn routes(&self) -> Vec<(AgentRole, Arc<dyn Agent>)> {
        AgentRole::ALL.into_iter().map(|role| (role, self.get(role))).collect()
    }

    /// Registrations for the message bus, keyed by role name
    pub fn bus_agents(&self) -> Vec<(AgentId, Arc<dyn Agent>)> {
        AgentRole::ALL
            .into_iter()
            .map(|role| (role.agent_id(), self.get(role)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Silent;

    #[async_trait]
    impl Agent for Silent {
        fn name(&self) -> &str {
            "Silent"
        }
    }

    #[test]
    fn test_role_names_round_trip() {
        for role in AgentRole::ALL {
            assert_eq!(role.as_str().parse::<AgentRole>().unwrap(), role);
        }
        assert_eq!("factcheck".parse::<AgentRole>().unwrap(), AgentRole::FactCheck);
        assert!("Librarian".parse::<AgentRole>().is_err());
    }

    #[test]
    fn test_payload_error() {
        assert_eq!(payload_error(&json!({"summary": "x"})), None);
        assert_eq!(payload_error(&json!({"error": null})), None);
        assert_eq!(payload_error(&json!({"error": ""})), None);
        assert_eq!(payload_error(&json!({"error": "boom"})).as_deref(), Some("boom"));
        assert_eq!(payload_error(&json!({"error": {"code": 1}})).as_deref(), Some(r#"{"code":1}"#));
    }

    #[tokio::test]
    async fn test_default_process_query_is_unsupported() {
        let err = Silent.process_query("anything").await.unwrap_err();
        assert!(matches!(err, AgentError::Unsupported { .. }));
        assert_eq!(err.to_string(), "Silent does not support process_query");
    }
}
