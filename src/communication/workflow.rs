// Scholar -> FactCheck -> Citation -> Context chain over the bus

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::AgentCommunicationProtocol;
use crate::agents::{payload_error, AgentRole, DEFAULT_CHAT_ID};
use crate::types::{AppError, AppResult};

const USER: &str = "User";
/// Citation input when the fact check produced no evaluation
const NO_EVALUATION: &str = "No eval to cite.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvancedWorkflowResult {
    pub scholar_data: Option<Value>,
    pub factcheck_data: Option<Value>,
    pub citation_data: Option<Value>,
    pub context_data: Option<Value>,
}

async fn step(
    protocol: &AgentCommunicationProtocol,
    sender: AgentRole,
    recipient: AgentRole,
    content: Value,
    timeout: Duration,
) -> AppResult<Value> {
    let message_id = protocol.send_message(sender.as_str(), recipient.as_str(), content)?;
    Ok(protocol.await_response(message_id, timeout).await.into_payload())
}

/// Run a query through Scholar, then fact-check the summary, cite the
/// evaluation in MLA and record the query in the chat context.
///
/// Only the Scholar step is mandatory. A missing later agent ends the chain
/// early; a failing later agent leaves `{"error": ..}` in its field.
pub async fn run_advanced_messaging_workflow(
    protocol: &AgentCommunicationProtocol,
    user_query: &str,
    chat_id: Option<&str>,
    step_timeout: Duration,
) -> AppResult<AdvancedWorkflowResult> {
    let scholar = AgentRole::Scholar.as_str();
    if !protocol.has_agent(scholar) {
        return Err(AppError::NotFound(format!("{} agent is not registered", scholar)));
    }
    info!(query = %user_query, "Starting advanced messaging workflow");

    let message_id = protocol.send_message(USER, scholar, json!({ "text": user_query }))?;
    let scholar_data = protocol
        .await_response(message_id, step_timeout)
        .await
        .into_result()
        .map_err(|message| AppError::AgentFailed {
            agent: scholar.to_string(),
            message,
        })?;
    if let Some(message) = payload_error(&scholar_data) {
        return Err(AppError::AgentFailed {
            agent: scholar.to_string(),
            message,
        });
    }

    let mut result = AdvancedWorkflowResult {
        scholar_data: Some(scholar_data),
        ..Default::default()
    };

    if !protocol.has_agent(AgentRole::FactCheck.as_str()) {
        return Ok(result);
    }
    let summary = result
        .scholar_data
        .as_ref()
        .and_then(|d| d.get("summary"))
        .and_then(Value::as_str)
        .unwrap_or(user_query)
        .to_string();
    let factcheck = step(
        protocol,
        AgentRole::Scholar,
        AgentRole::FactCheck,
        json!({ "text": summary }),
        step_timeout,
    )
    .await?;

    if !protocol.has_agent(AgentRole::Citation.as_str()) {
        result.factcheck_data = Some(factcheck);
        return Ok(result);
    }
    let evaluation = factcheck
        .get("evaluation")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .unwrap_or(NO_EVALUATION)
        .to_string();
    result.factcheck_data = Some(factcheck);
    result.citation_data = Some(
        step(
            protocol,
            AgentRole::FactCheck,
            AgentRole::Citation,
            json!({ "text": format!("{} mla", evaluation) }),
            step_timeout,
        )
        .await?,
    );

    if protocol.has_agent(AgentRole::Context.as_str()) {
        result.context_data = Some(
            step(
                protocol,
                AgentRole::Citation,
                AgentRole::Context,
                json!({ "text": user_query, "chat_id": chat_id.unwrap_or(DEFAULT_CHAT_ID) }),
                step_timeout,
            )
            .await?,
        );
    }

    info!("Advanced messaging workflow completed");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Agent, AgentResult, ContextAgent};
    use crate::communication::AgentId;
    use crate::config::BusConfig;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records every query and answers with a fixed payload
    struct Scripted {
        reply: Value,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Agent for Scripted {
        fn name(&self) -> &str {
            "Scripted"
        }

        async fn process_query(&self, query: &str) -> AgentResult<Value> {
            self.seen.lock().unwrap().push(query.to_string());
            Ok(self.reply.clone())
        }
    }

    const STEP: Duration = Duration::from_secs(2);

    fn protocol(agents: Vec<(AgentRole, Arc<dyn Agent>)>) -> AgentCommunicationProtocol {
        let agents = agents
            .into_iter()
            .map(|(role, agent)| (role.agent_id(), agent))
            .collect();
        AgentCommunicationProtocol::new(agents, BusConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_full_chain() {
        let scholar = Scripted::new(json!({"summary": "Coffee is studied.", "sources": [], "error": null}));
        let factcheck = Scripted::new(json!({"factcheck_score": 0.7, "evaluation": "Found references.", "error": null}));
        let citation = Scripted::new(json!({"citations": ["c"], "style": "MLA", "error": null}));
        let context = Arc::new(ContextAgent::new());

        let bus = protocol(vec![
            (AgentRole::Scholar, scholar.clone() as Arc<dyn Agent>),
            (AgentRole::FactCheck, factcheck.clone() as Arc<dyn Agent>),
            (AgentRole::Citation, citation.clone() as Arc<dyn Agent>),
            (AgentRole::Context, context.clone() as Arc<dyn Agent>),
        ]);

        let result = run_advanced_messaging_workflow(&bus, "coffee health", Some("chat-1"), STEP)
            .await
            .unwrap();

        assert_eq!(scholar.seen(), vec!["coffee health"]);
        assert_eq!(factcheck.seen(), vec!["Coffee is studied."]);
        assert_eq!(citation.seen(), vec!["Found references. mla"]);
        assert_eq!(result.citation_data.unwrap()["style"], "MLA");
        assert_eq!(result.context_data.unwrap()["context"], json!(["coffee health"]));
        assert_eq!(context.retrieve_context("chat-1"), vec!["coffee health"]);
    }

    #[tokio::test]
    async fn test_failed_fact_check_still_asks_for_citation() {
        let scholar = Scripted::new(json!({"summary": "s", "sources": [], "error": null}));
        let factcheck = Scripted::new(json!({"error": "NewsAPI unavailable"}));
        let citation = Scripted::new(json!({"citations": [], "style": "MLA", "error": null}));

        let bus = protocol(vec![
            (AgentRole::Scholar, scholar as Arc<dyn Agent>),
            (AgentRole::FactCheck, factcheck as Arc<dyn Agent>),
            (AgentRole::Citation, citation.clone() as Arc<dyn Agent>),
        ]);

        let result = run_advanced_messaging_workflow(&bus, "coffee health", None, STEP)
            .await
            .unwrap();

        assert_eq!(citation.seen(), vec!["No eval to cite. mla"]);
        assert_eq!(result.factcheck_data.unwrap()["error"], "NewsAPI unavailable");
        assert!(result.context_data.is_none());
    }

    #[tokio::test]
    async fn test_missing_scholar() {
        let bus = protocol(vec![]);
        let err = run_advanced_messaging_workflow(&bus, "q", None, STEP).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_scholar_error_payload_fails_workflow() {
        let scholar = Scripted::new(json!({"summary": "", "sources": [], "error": "CrossRef down"}));
        let bus = protocol(vec![(AgentRole::Scholar, scholar as Arc<dyn Agent>)]);

        let err = run_advanced_messaging_workflow(&bus, "q", None, STEP).await.unwrap_err();
        assert!(matches!(err, AppError::AgentFailed { ref message, .. } if message == "CrossRef down"));
    }

    #[tokio::test]
    async fn test_chain_stops_at_missing_agent() {
        let scholar = Scripted::new(json!({"summary": "s", "sources": [], "error": null}));
        let bus = protocol(vec![(AgentRole::Scholar, scholar as Arc<dyn Agent>)]);

        let result = run_advanced_messaging_workflow(&bus, "q", None, STEP).await.unwrap();
        assert!(result.scholar_data.is_some());
        assert!(result.factcheck_data.is_none());
        assert!(result.citation_data.is_none());
        assert!(result.context_data.is_none());
        assert_eq!(bus.pending_responses(AgentId::from("Scholar").as_str()), 0);
    }
}
