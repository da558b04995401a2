//! Agent discovery
//!
//! Lets the orchestrator swap in specialized agents for a query. Agents are
//! registered with capability and domain metadata; a query's matching agents
//! override the orchestrator's static routes role by role.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::agents::{Agent, AgentRole};
use crate::types::{AppError, AppResult};

#[async_trait]
pub trait AgentDiscovery: Send + Sync {
    /// Agents specialized for `domain`, at most one per role
    async fn find_specialized_agents(&self, domain: &str) -> AppResult<HashMap<AgentRole, Arc<dyn Agent>>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Empty means the agent serves every domain
    #[serde(default)]
    pub domains: Vec<String>,
}

impl AgentMetadata {
    /// The role an agent fills, by capability priority
    pub fn role(&self) -> Option<AgentRole> {
        const PRIORITY: [(&str, AgentRole); 4] = [
            ("academic_research", AgentRole::Scholar),
            ("fact_checking", AgentRole::FactCheck),
            ("contextual_information", AgentRole::Context),
            ("citation_generation", AgentRole::Citation),
        ];
        PRIORITY
            .iter()
            .find(|(capability, _)| self.capabilities.iter().any(|c| c == capability))
            .map(|(_, role)| *role)
    }

    pub fn serves(&self, query: &str) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        self.domains
            .iter()
            .any(|domain| !domain.is_empty() && query.contains(&domain.to_lowercase()))
    }
}

struct Registration {
    metadata: AgentMetadata,
    agent: Arc<dyn Agent>,
}

/// In-process discovery registry
#[derive(Default)]
pub struct AgentDiscoveryService {
    registry: RwLock<Vec<Registration>>,
}

impl AgentDiscoveryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an agent by id
    pub async fn register_agent(&self, metadata: AgentMetadata, agent: Arc<dyn Agent>) -> AppResult<()> {
        if metadata.id.trim().is_empty() {
            return Err(AppError::InvalidRequest("Agent id must not be empty".to_string()));
        }
        info!(agent_id = %metadata.id, role = ?metadata.role(), "Registering discoverable agent");

        let mut registry = self.registry.write().await;
        let existing = registry.iter().position(|r| r.metadata.id == metadata.id);
        let registration = Registration { metadata, agent };
        match existing {
            Some(index) => registry[index] = registration,
            None => registry.push(registration),
        }
        Ok(())
    }

    pub async fn unregister_agent(&self, id: &str) -> bool {
        let mut registry = self.registry.write().await;
        let before = registry.len();
        registry.retain(|r| r.metadata.id != id);
        registry.len() != before
    }

    pub async fn clear(&self) {
        self.registry.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AgentDiscovery for AgentDiscoveryService {
    async fn find_specialized_agents(&self, domain: &str) -> AppResult<HashMap<AgentRole, Arc<dyn Agent>>> {
        let registry = self.registry.read().await;
        let mut found: HashMap<AgentRole, Arc<dyn Agent>> = HashMap::new();

        for registration in registry.iter().filter(|r| r.metadata.serves(domain)) {
            if let Some(role) = registration.metadata.role() {
                found
                    .entry(role)
                    .or_insert_with(|| Arc::clone(&registration.agent));
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentResult;
    use serde_json::{json, Value};

    struct Named(&'static str);

    #[async_trait]
    impl Agent for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn process_query(&self, _query: &str) -> AgentResult<Value> {
            Ok(json!({ "from": self.0 }))
        }
    }

    fn metadata(id: &str, capabilities: &[&str], domains: &[&str]) -> AgentMetadata {
        AgentMetadata {
            id: id.to_string(),
            name: id.to_string(),
            capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
            domains: domains.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_role_priority() {
        let both = metadata("x", &["citation_generation", "academic_research"], &[]);
        assert_eq!(both.role(), Some(AgentRole::Scholar));
        assert_eq!(metadata("y", &["painting"], &[]).role(), None);
    }

    #[tokio::test]
    async fn test_domain_matching_first_wins() {
        let service = AgentDiscoveryService::new();
        service
            .register_agent(metadata("bio", &["academic_research"], &["Biology"]), Arc::new(Named("bio")))
            .await
            .unwrap();
        service
            .register_agent(metadata("any", &["academic_research"], &[]), Arc::new(Named("any")))
            .await
            .unwrap();
        service
            .register_agent(metadata("cite", &["citation_generation"], &["physics"]), Arc::new(Named("cite")))
            .await
            .unwrap();

        let found = service.find_specialized_agents("marine biology of reefs").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[&AgentRole::Scholar].name(), "bio");

        let found = service.find_specialized_agents("quantum physics").await.unwrap();
        assert_eq!(found[&AgentRole::Scholar].name(), "any");
        assert_eq!(found[&AgentRole::Citation].name(), "cite");
    }

    #[tokio::test]
    async fn test_register_rejects_empty_id() {
        let service = AgentDiscoveryService::new();
        let result = service
            .register_agent(metadata(" ", &["fact_checking"], &[]), Arc::new(Named("x")))
            .await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        assert!(service.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister_and_replace() {
        let service = AgentDiscoveryService::new();
        service
            .register_agent(metadata("a", &["fact_checking"], &[]), Arc::new(Named("first")))
            .await
            .unwrap();
        service
            .register_agent(metadata("a", &["fact_checking"], &[]), Arc::new(Named("second")))
            .await
            .unwrap();
        assert_eq!(service.len().await, 1);

        let found = service.find_specialized_agents("anything").await.unwrap();
        assert_eq!(found[&AgentRole::FactCheck].name(), "second");

        assert!(service.unregister_agent("a").await);
        assert!(!service.unregister_agent("a").await);
    }
}
