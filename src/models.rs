// Shared application state and HTTP request/response models

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::agents::{CitationStyle, ResearchAgents};
use crate::communication::{AdvancedWorkflowResult, AgentCommunicationProtocol};
use crate::config::Config;
use crate::orchestrator::{AgentDiscovery, AgentDiscoveryService, ThesysOrchestrator, WorkflowReport};
use crate::types::AppResult;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub agents: ResearchAgents,
    pub orchestrator: Arc<ThesysOrchestrator>,
    pub protocol: Arc<AgentCommunicationProtocol>,
    pub discovery: Arc<AgentDiscoveryService>,
}

impl AppState {
    /// Build agents, the orchestrator and the message bus.
    ///
    /// Spawns the bus workers, so it must run inside a tokio runtime.
    pub fn from_config(config: Config) -> AppResult<Self> {
        let agents = ResearchAgents::from_config(&config)?;
        let discovery = Arc::new(AgentDiscoveryService::new());
        let orchestrator = ThesysOrchestrator::from_agents(
            &agents,
            &config.orchestrator,
            Some(discovery.clone() as Arc<dyn AgentDiscovery>),
        );
        let protocol = AgentCommunicationProtocol::new(agents.bus_agents(), config.bus.clone())?;
        info!(roles = ?orchestrator.roles(), "Application state ready");

        Ok(Self {
            config: Arc::new(config),
            agents,
            orchestrator: Arc::new(orchestrator),
            protocol: Arc::new(protocol),
            discovery,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResearchRequest {
    #[validate(length(min = 1, max = 2000, message = "query must be 1-2000 characters"))]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ResearchResponse {
    pub query: String,
    #[serde(flatten)]
    pub report: WorkflowReport,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 2000, message = "message must be 1-2000 characters"))]
    pub message: String,
    #[validate(length(min = 1, max = 128))]
    pub chat_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat_id: String,
    #[serde(flatten)]
    pub result: AdvancedWorkflowResult,
    pub response_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub chat_id: String,
    pub context: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CitationRequest {
    #[validate(length(min = 1, max = 2000, message = "text must be 1-2000 characters"))]
    pub text: String,
    #[serde(default)]
    pub style: Option<CitationStyle>,
}

#[derive(Debug, Serialize)]
pub struct CitationResponse {
    pub citations: Vec<String>,
    pub style: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CacheClearedResponse {
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub agents: Vec<String>,
    pub cached_workflows: usize,
    pub llm_summaries: bool,
}
