//! Thesys Orchestrator
//!
//! Fans a research query out to every routed agent, validates what comes
//! back and folds it into a single `WorkflowReport`.
//!
//! ```text
//!  query ─► cache? ──hit──► Arc<WorkflowReport>
//!             │ miss
//!             ▼
//!   static routes + discovered agents
//!             │  join_all (per-agent timeout)
//!             ▼
//!   validate (drop errors, fact-check) ─► report ─► cache
//! ```
//!
//! A failing, panicking or slow agent only costs its own role; the rest of
//! the report is still produced.

pub mod cache;
pub mod discovery;

pub use cache::WorkflowCache;
pub use discovery::{AgentDiscovery, AgentDiscoveryService, AgentMetadata};

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::agents::{payload_error, Agent, AgentRole, FactChecker, ResearchAgents};
use crate::config::OrchestratorConfig;

/// Final answer to a research query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub summary: String,
    pub citations: Vec<Value>,
    pub sources: Vec<Value>,
}

pub type AgentResponses = BTreeMap<AgentRole, Value>;

pub struct ThesysOrchestrator {
    routes: BTreeMap<AgentRole, Arc<dyn Agent>>,
    fact_checker: Option<Arc<dyn FactChecker>>,
    discovery: Option<Arc<dyn AgentDiscovery>>,
    cache: WorkflowCache,
    agent_timeout: Option<Duration>,
}

#[derive(Default)]
pub struct ThesysOrchestratorBuilder {
    routes: BTreeMap<AgentRole, Arc<dyn Agent>>,
    fact_checker: Option<Arc<dyn FactChecker>>,
    discovery: Option<Arc<dyn AgentDiscovery>>,
    cache: Option<WorkflowCache>,
    agent_timeout: Option<Duration>,
}

impl ThesysOrchestratorBuilder {
    pub fn route(mut self, role: AgentRole, agent: Arc<dyn Agent>) -> Self {
        self.routes.insert(role, agent);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = (AgentRole, Arc<dyn Agent>)>) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn fact_checker(mut self, fact_checker: Arc<dyn FactChecker>) -> Self {
        self.fact_checker = Some(fact_checker);
        self
    }

    pub fn discovery(mut self, discovery: Arc<dyn AgentDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn cache(mut self, cache: WorkflowCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn agent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn build(self) -> ThesysOrchestrator {
        ThesysOrchestrator {
            routes: self.routes,
            fact_checker: self.fact_checker,
            discovery: self.discovery,
            cache: self.cache.unwrap_or_default(),
            agent_timeout: self.agent_timeout,
        }
    }
}

impl ThesysOrchestrator {
    pub fn builder() -> ThesysOrchestratorBuilder {
        ThesysOrchestratorBuilder::default()
    }

    /// Standard wiring: all four agents, FactCheck as the fact checker
    pub fn from_agents(
        agents: &ResearchAgents,
        config: &OrchestratorConfig,
        discovery: Option<Arc<dyn AgentDiscovery>>,
    ) -> Self {
        let mut builder = Self::builder()
            .routes(agents.routes())
            .fact_checker(agents.factcheck.clone())
            .cache(WorkflowCache::from_config(config))
            .agent_timeout(config.agent_timeout());
        if let Some(discovery) = discovery {
            builder = builder.discovery(discovery);
        }
        builder.build()
    }

    pub fn roles(&self) -> Vec<AgentRole> {
        self.routes.keys().copied().collect()
    }

    pub async fn execute_research_workflow(&self, query: &str) -> Arc<WorkflowReport> {
        if let Some(report) = self.cache.get(query).await {
            debug!(query = %query, "Workflow cache hit");
            return report;
        }

        let routes = self.resolve_routes(query).await;
        info!(query = %query, agents = routes.len(), "Executing research workflow");

        let responses = self.dispatch(query, &routes).await;
        let validated = self.validate_agent_responses(responses).await;
        let report = Arc::new(Self::generate_final_report(&validated));

        self.cache.insert(query, Arc::clone(&report)).await;
        info!(
            query = %query,
            sources = report.sources.len(),
            citations = report.citations.len(),
            "Research workflow completed"
        );
        report
    }

    /// Static routes, overridden role by role by discovered agents
    async fn resolve_routes(&self, query: &str) -> BTreeMap<AgentRole, Arc<dyn Agent>> {
        let mut routes = self.routes.clone();
        if let Some(discovery) = &self.discovery {
            match discovery.find_specialized_agents(query).await {
                Ok(found) => {
                    for (role, agent) in found {
                        debug!(role = %role, agent = %agent.name(), "Using discovered agent");
                        routes.insert(role, agent);
                    }
                }
                Err(e) => warn!(error = %e, "Agent discovery failed, using static routes"),
            }
        }
        routes
    }

    async fn dispatch(&self, query: &str, routes: &BTreeMap<AgentRole, Arc<dyn Agent>>) -> AgentResponses {
        let calls = routes.iter().map(|(role, agent)| async move {
            let work = AssertUnwindSafe(agent.process_query(query)).catch_unwind();
            let outcome = match self.agent_timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(role = %role, ?limit, "Agent timed out");
                        return (*role, json!({ "error": format!("{} timed out after {:?}", role, limit) }));
                    }
                },
                None => work.await,
            };

            let value = match outcome {
                Ok(Ok(value)) => value,
                Ok(Err(e)) => {
                    warn!(role = %role, error = %e, "Agent failed");
                    json!({ "error": e.to_string() })
                }
                Err(_) => {
                    warn!(role = %role, "Agent panicked");
                    json!({ "error": format!("{} agent panicked", role) })
                }
            };
            (*role, value)
        });

        join_all(calls).await.into_iter().collect()
    }

    /// Drop errored roles and fact-check the rest.
    ///
    /// A role the fact checker rejects is kept but marked unverified.
    pub async fn validate_agent_responses(&self, responses: AgentResponses) -> AgentResponses {
        let mut validated = AgentResponses::new();

        for (role, data) in responses {
            if let Some(error) = payload_error(&data) {
                debug!(role = %role, error = %error, "Dropping failed agent response");
                continue;
            }

            let data = match &self.fact_checker {
                Some(checker) => match checker.verify_information(role, data.clone()).await {
                    Ok(verified) => verified,
                    Err(e) => {
                        warn!(role = %role, error = %e, "Fact check failed, marking unverified");
                        mark_unverified(data, &e.to_string())
                    }
                },
                None => data,
            };
            validated.insert(role, data);
        }

        validated
    }

    /// Summary and sources come from Scholar, citations from Citation
    pub fn generate_final_report(validated: &AgentResponses) -> WorkflowReport {
        WorkflowReport {
            summary: role_field(validated, AgentRole::Scholar, "summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            citations: role_list(validated, AgentRole::Citation, "citations"),
            sources: role_list(validated, AgentRole::Scholar, "sources"),
        }
    }

    /// Returns how many cached reports were dropped
    pub async fn clear_workflow_cache(&self) -> usize {
        let cleared = self.cache.clear().await;
        info!(cleared, "Workflow cache cleared");
        cleared
    }

    pub async fn cached_workflows(&self) -> usize {
        self.cache.len().await
    }
}

fn role_field<'a>(validated: &'a AgentResponses, role: AgentRole, key: &str) -> Option<&'a Value> {
    validated.get(&role).and_then(|data| data.get(key))
}

fn role_list(validated: &AgentResponses, role: AgentRole, key: &str) -> Vec<Value> {
    role_field(validated, role, key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn mark_unverified(data: Value, reason: &str) -> Value {
    let mut fields = match data {
        Value::Object(fields) => fields,
        other => {
            let mut wrapped = serde_json::Map::new();
            wrapped.insert("result".to_string(), other);
            wrapped
        }
    };
    fields.insert("verified".to_string(), Value::Bool(false));
    fields.insert("verification_error".to_string(), Value::String(reason.to_string()));
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentError, AgentResult};
    use crate::types::AppResult;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        reply: AgentResult<Value>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn ok(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(AgentError::Internal(message.to_string())),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Agent for Fixed {
        fn name(&self) -> &str {
            "Fixed"
        }

        async fn process_query(&self, _query: &str) -> AgentResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(value) => Ok(value.clone()),
                Err(e) => Err(AgentError::Internal(e.to_string())),
            }
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Agent for Sleepy {
        fn name(&self) -> &str {
            "Sleepy"
        }

        async fn process_query(&self, _query: &str) -> AgentResult<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!({}))
        }
    }

    struct Exploding;

    #[async_trait]
    impl Agent for Exploding {
        fn name(&self) -> &str {
            "Exploding"
        }

        async fn process_query(&self, _query: &str) -> AgentResult<Value> {
            panic!("kaboom")
        }
    }

    /// Verifies everything except Citation results
    struct PickyChecker;

    #[async_trait]
    impl FactChecker for PickyChecker {
        async fn verify_information(&self, role: AgentRole, mut data: Value) -> AgentResult<Value> {
            if role == AgentRole::Citation {
                return Err(AgentError::Internal("cannot verify citations".to_string()));
            }
            data["verified"] = Value::Bool(true);
            Ok(data)
        }
    }

    struct FailingDiscovery;

    #[async_trait]
    impl AgentDiscovery for FailingDiscovery {
        async fn find_specialized_agents(&self, _domain: &str) -> AppResult<HashMap<AgentRole, Arc<dyn Agent>>> {
            Err(crate::types::AppError::Internal("registry offline".to_string()))
        }
    }

    fn scholar_reply() -> Value {
        json!({"summary": "S", "sources": ["src1"], "error": null})
    }

    fn citation_reply() -> Value {
        json!({"citations": ["c1", "c2"], "style": "APA", "error": null})
    }

    #[tokio::test]
    async fn test_report_from_scholar_and_citation() {
        let orchestrator = ThesysOrchestrator::builder()
            .route(AgentRole::Scholar, Fixed::ok(scholar_reply()))
            .route(AgentRole::Citation, Fixed::ok(citation_reply()))
            .route(AgentRole::FactCheck, Fixed::ok(json!({"factcheck_score": 0.7, "evaluation": "ok"})))
            .build();

        let report = orchestrator.execute_research_workflow("q").await;
        assert_eq!(
            *report,
            WorkflowReport {
                summary: "S".to_string(),
                citations: vec![json!("c1"), json!("c2")],
                sources: vec![json!("src1")],
            }
        );
    }

    #[tokio::test]
    async fn test_cache_hit_skips_agents() {
        let scholar = Fixed::ok(scholar_reply());
        let orchestrator = ThesysOrchestrator::builder()
            .route(AgentRole::Scholar, scholar.clone())
            .build();

        let first = orchestrator.execute_research_workflow("q").await;
        let second = orchestrator.execute_research_workflow("q").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(scholar.calls.load(Ordering::SeqCst), 1);

        assert_eq!(orchestrator.clear_workflow_cache().await, 1);
        orchestrator.execute_research_workflow("q").await;
        assert_eq!(scholar.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_agent_only_loses_its_role() {
        let orchestrator = ThesysOrchestrator::builder()
            .route(AgentRole::Scholar, Fixed::failing("CrossRef down"))
            .route(AgentRole::Citation, Fixed::ok(citation_reply()))
            .route(AgentRole::Context, Arc::new(Exploding))
            .build();

        let report = orchestrator.execute_research_workflow("q").await;
        assert_eq!(report.summary, "");
        assert!(report.sources.is_empty());
        assert_eq!(report.citations.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_timeout() {
        let orchestrator = ThesysOrchestrator::builder()
            .route(AgentRole::Scholar, Fixed::ok(scholar_reply()))
            .route(AgentRole::Citation, Arc::new(Sleepy))
            .agent_timeout(Some(Duration::from_secs(1)))
            .build();

        let report = orchestrator.execute_research_workflow("q").await;
        assert_eq!(report.summary, "S");
        assert!(report.citations.is_empty());
    }

    #[tokio::test]
    async fn test_validation_drops_errors_and_demotes_unverifiable() {
        let orchestrator = ThesysOrchestrator::builder()
            .fact_checker(Arc::new(PickyChecker))
            .build();

        let mut responses = AgentResponses::new();
        responses.insert(AgentRole::Scholar, scholar_reply());
        responses.insert(AgentRole::FactCheck, json!({"error": "NewsAPI down"}));
        responses.insert(AgentRole::Citation, citation_reply());

        let validated = orchestrator.validate_agent_responses(responses).await;
        assert!(!validated.contains_key(&AgentRole::FactCheck));
        assert_eq!(validated[&AgentRole::Scholar]["verified"], true);
        assert_eq!(validated[&AgentRole::Citation]["verified"], false);
        assert_eq!(
            validated[&AgentRole::Citation]["verification_error"],
            "Internal agent error: cannot verify citations"
        );
        assert_eq!(validated[&AgentRole::Citation]["citations"], json!(["c1", "c2"]));
    }

    #[tokio::test]
    async fn test_discovery_overrides_static_route() {
        let discovery = Arc::new(AgentDiscoveryService::new());
        discovery
            .register_agent(
                AgentMetadata {
                    id: "marine-scholar".to_string(),
                    name: "Marine Scholar".to_string(),
                    capabilities: vec!["academic_research".to_string()],
                    domains: vec!["ocean".to_string()],
                },
                Fixed::ok(json!({"summary": "Discovered", "sources": [], "error": null})),
            )
            .await
            .unwrap();

        let orchestrator = ThesysOrchestrator::builder()
            .route(AgentRole::Scholar, Fixed::ok(scholar_reply()))
            .discovery(discovery)
            .build();

        assert_eq!(orchestrator.execute_research_workflow("ocean warming").await.summary, "Discovered");
        assert_eq!(orchestrator.execute_research_workflow("soil carbon").await.summary, "S");
    }

    #[tokio::test]
    async fn test_discovery_failure_falls_back() {
        let orchestrator = ThesysOrchestrator::builder()
            .route(AgentRole::Scholar, Fixed::ok(scholar_reply()))
            .discovery(Arc::new(FailingDiscovery))
            .build();

        assert_eq!(orchestrator.execute_research_workflow("q").await.summary, "S");
    }

    #[test]
    fn test_mark_unverified_wraps_non_objects() {
        let marked = mark_unverified(json!(["a"]), "nope");
        assert_eq!(marked, json!({"result": ["a"], "verified": false, "verification_error": "nope"}));
    }
}
