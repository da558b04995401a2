// End-to-end behavior of the message bus and the orchestrator

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use thesys::agents::{Agent, AgentError, AgentResult, AgentRole};
use thesys::communication::{AgentCommunicationProtocol, AgentId, Message};
use thesys::config::BusConfig;
use thesys::orchestrator::{ThesysOrchestrator, WorkflowReport};

const WAIT: Duration = Duration::from_secs(2);

/// Bus agent that echoes its message; "boom" fails
struct Responder(&'static str);

#[async_trait]
impl Agent for Responder {
    fn name(&self) -> &str {
        self.0
    }

    async fn process_message(&self, message: &Message) -> AgentResult<Value> {
        match message.text() {
            Some("boom") => Err(AgentError::Failed("boom".to_string())),
            text => Ok(json!({ "agent": self.0, "text": text })),
        }
    }
}

/// Orchestrator agent whose answer changes on every call
struct Counting {
    reply: Value,
    calls: AtomicUsize,
}

impl Counting {
    fn new(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Agent for Counting {
    fn name(&self) -> &str {
        "Counting"
    }

    async fn process_query(&self, _query: &str) -> AgentResult<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut reply = self.reply.clone();
        if let Some(summary) = reply.get_mut("summary") {
            *summary = json!(format!("{} #{}", summary.as_str().unwrap_or_default(), call));
        }
        Ok(reply)
    }
}

struct Broken;

#[async_trait]
impl Agent for Broken {
    fn name(&self) -> &str {
        "Broken"
    }

    async fn process_query(&self, _query: &str) -> AgentResult<Value> {
        Err(AgentError::Internal("context store unavailable".to_string()))
    }
}

fn three_agent_bus() -> AgentCommunicationProtocol {
    let agents: Vec<(AgentId, Arc<dyn Agent>)> = ["A", "B", "C"]
        .into_iter()
        .map(|id| (AgentId::from(id), Arc::new(Responder(id)) as Arc<dyn Agent>))
        .collect();
    AgentCommunicationProtocol::new(agents, BusConfig::default()).unwrap()
}

#[tokio::test]
async fn send_then_get_response_returns_correlated_result() {
    let bus = three_agent_bus();

    let id = bus.send_message("User", "A", json!({"text": "q"})).unwrap();
    let response = bus.get_response("A", WAIT).await;

    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire["message_id"], json!(id));
    assert_eq!(wire["result"], json!({"agent": "A", "text": "q"}));
    assert!(wire.get("error").is_none());
    bus.shutdown().await;
}

#[tokio::test]
async fn failing_message_keeps_worker_alive() {
    let bus = three_agent_bus();

    let failed_id = bus.send_message("User", "A", json!({"text": "boom"})).unwrap();
    let failed = bus.get_response("A", WAIT).await;
    assert_eq!(failed.message_id, Some(failed_id));
    assert_eq!(failed.error.as_deref(), Some("boom"));
    let wire = serde_json::to_value(&failed).unwrap();
    assert_eq!(wire["error"], json!("boom"));
    assert_eq!(wire["message_id"], json!(failed_id));

    bus.send_message("User", "A", json!({"text": "again"})).unwrap();
    let next = bus.get_response("A", WAIT).await;
    assert_eq!(next.result, Some(json!({"agent": "A", "text": "again"})));
    bus.shutdown().await;
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let scholar = Counting::new(json!({"summary": "first", "sources": ["s"], "error": null}));
    let orchestrator = ThesysOrchestrator::builder()
        .route(AgentRole::Scholar, scholar.clone())
        .build();

    let first = orchestrator.execute_research_workflow("query1").await;
    let second = orchestrator.execute_research_workflow("query1").await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.summary, "first #0");
    assert_eq!(scholar.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_role_is_left_out_of_report() {
    let orchestrator = ThesysOrchestrator::builder()
        .route(AgentRole::Scholar, Counting::new(json!({"summary": "S", "sources": ["src"], "error": null})))
        .route(AgentRole::FactCheck, Counting::new(json!({"factcheck_score": 0.7, "evaluation": "ok", "error": null})))
        .route(AgentRole::Citation, Counting::new(json!({"citations": ["c"], "style": "APA", "error": null})))
        .route(AgentRole::Context, Arc::new(Broken))
        .build();

    let report = orchestrator.execute_research_workflow("query").await;
    assert_eq!(
        *report,
        WorkflowReport {
            summary: "S #0".to_string(),
            citations: vec![json!("c")],
            sources: vec![json!("src")],
        }
    );

    let wire = serde_json::to_value(&*report).unwrap();
    assert!(wire.get("error").is_none());
}
