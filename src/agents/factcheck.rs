// FactCheck agent: scores a claim by academic and news coverage

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{Agent, AgentError, AgentResult, AgentRole, FactChecker};
use crate::search::crossref::WorkSort;
use crate::search::{CrossRefClient, NewsApiClient};
use crate::types::AppResult;

/// Minimum score for a result to count as verified
pub const VERIFIED_THRESHOLD: f64 = 0.7;

const BASE_SCORE: f64 = 0.5;
const ACADEMIC_SCORE: f64 = 0.7;
const NEWS_BONUS: f64 = 0.1;
const REFERENCE_ROWS: usize = 2;
const NEWS_PAGE_SIZE: usize = 5;

const EXTERNAL_MARKERS: [&str; 2] = ["factcheck:", "verify:"];
const NEGATION_MARKER: &str = "false?";

pub struct FactCheckAgent {
    crossref: Arc<CrossRefClient>,
    news: Option<NewsApiClient>,
}

impl FactCheckAgent {
    pub fn new(crossref: Arc<CrossRefClient>) -> Self {
        Self { crossref, news: None }
    }

    pub fn with_news(mut self, news: NewsApiClient) -> Self {
        self.news = Some(news);
        self
    }

    pub fn from_config(config: &crate::config::SearchConfig, crossref: Arc<CrossRefClient>) -> AppResult<Self> {
        let agent = Self::new(crossref);
        Ok(match NewsApiClient::from_config(config)? {
            Some(news) => agent.with_news(news),
            None => agent,
        })
    }

    pub fn has_news(&self) -> bool {
        self.news.is_some()
    }

    /// Score a claim and describe the evidence behind the score
    pub async fn check_claim(&self, query: &str) -> AgentResult<(f64, String)> {
        let lower = query.to_lowercase();
        let claim = claim_text(query);
        let mut score = BASE_SCORE;
        let mut evaluation = String::from("No strong evidence found.");

        let references = self
            .crossref
            .search_works(&claim, REFERENCE_ROWS, WorkSort::Score)
            .await?;
        if !references.is_empty() {
            score = ACADEMIC_SCORE;
            evaluation = "Found some references in CrossRef. Claim might have academic coverage.".to_string();
        }

        if EXTERNAL_MARKERS.iter().any(|m| lower.contains(m)) {
            match &self.news {
                Some(news) => match news.search_everything(&claim, NEWS_PAGE_SIZE).await {
                    Ok(coverage) if coverage.total_results > 0 => {
                        score += NEWS_BONUS;
                        evaluation.push_str(&format!(
                            " News coverage found ({} articles), suggesting partial support.",
                            coverage.total_results
                        ));
                    }
                    Ok(_) => evaluation.push_str(" No news coverage found."),
                    Err(e) => {
                        warn!(error = %e, "News lookup failed during fact check");
                        evaluation.push_str(" External check unavailable.");
                    }
                },
                None => evaluation.push_str(" External check unavailable."),
            }
        }

        if lower.contains(NEGATION_MARKER) {
            score = 1.0 - score;
            evaluation.push_str(" The query implies negativity about the claim.");
        }

        Ok((score.clamp(0.0, 1.0), evaluation))
    }
}

/// The claim with the control markers removed
fn claim_text(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|word| {
            let w = word.to_lowercase();
            !EXTERNAL_MARKERS.contains(&w.as_str()) && w != NEGATION_MARKER
        })
        .map(|word| {
            let lower = word.to_lowercase();
            EXTERNAL_MARKERS
                .iter()
                .find(|m| lower.starts_with(*m))
                .and_then(|m| word.get(m.len()..))
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Agent for FactCheckAgent {
    fn name(&self) -> &str {
        "FactCheck"
    }

    async fn process_query(&self, query: &str) -> AgentResult<Value> {
        if query.trim().is_empty() {
            return Err(AgentError::InvalidInput("Nothing to fact-check".to_string()));
        }
        info!(query = %query, "FactCheck agent evaluating claim");

        let (score, evaluation) = self.check_claim(query).await?;
        info!(score, "FactCheck agent finished");

        Ok(json!({
            "factcheck_score": score,
            "evaluation": evaluation,
            "error": null,
        }))
    }
}

#[async_trait]
impl FactChecker for FactCheckAgent {
    /// Marks `verified` from the payload's own `factcheck_score`; a payload
    /// without one is unverified.
    async fn verify_information(&self, role: AgentRole, mut data: Value) -> AgentResult<Value> {
        let Some(fields) = data.as_object_mut() else {
            return Err(AgentError::InvalidInput(format!(
                "{} result is not a JSON object",
                role
            )));
        };
        let score = fields
            .get("factcheck_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        fields.insert("verified".to_string(), Value::Bool(score >= VERIFIED_THRESHOLD));
        Ok(data)
    }
}
