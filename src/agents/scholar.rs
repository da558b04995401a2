//! Scholar Agent
//!
//! Searches CrossRef for the top papers on a query, optionally widens the
//! search with Semantic Scholar and arXiv, and summarizes what it found.
//! With an LLM configured the summary is a structured literature digest;
//! without one (or when the LLM call fails) it falls back to a title digest.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{Agent, AgentError, AgentResult};
use crate::llm::provider::{LLMProviderConfig, LLM};
use crate::search::crossref::WorkSort;
use crate::search::{ArxivClient, CrossRefClient, Paper, SemanticScholarClient};
use crate::types::{AppResult, LLMMessage, LLMRequest};

const ABSTRACT_CHARS: usize = 1200;

/// Sections the LLM is asked to fill in
#[derive(Debug, Deserialize)]
struct LiteratureSummary {
    #[serde(default)]
    key_findings: String,
    #[serde(default)]
    methodology: String,
    #[serde(default)]
    contradictions: String,
    #[serde(default)]
    additional_notes: String,
    #[serde(default)]
    gaps_in_literature: String,
}

impl LiteratureSummary {
    fn render(&self) -> String {
        [
            ("Key Findings", &self.key_findings),
            ("Methodology", &self.methodology),
            ("Contradictions", &self.contradictions),
            ("Additional Notes", &self.additional_notes),
            ("Gaps in literature", &self.gaps_in_literature),
        ]
        .iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(label, text)| format!("{}: {}", label, text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

pub struct ScholarAgent {
    crossref: Arc<CrossRefClient>,
    semantic_scholar: Option<SemanticScholarClient>,
    arxiv: Option<ArxivClient>,
    llm: Option<(LLM, String)>,
    max_results: usize,
}

impl ScholarAgent {
    pub fn new(crossref: Arc<CrossRefClient>, max_results: usize) -> Self {
        Self {
            crossref,
            semantic_scholar: None,
            arxiv: None,
            llm: None,
            max_results: max_results.max(1),
        }
    }

    pub fn with_semantic_scholar(mut self, client: SemanticScholarClient) -> Self {
        self.semantic_scholar = Some(client);
        self
    }

    pub fn with_arxiv(mut self, client: ArxivClient) -> Self {
        self.arxiv = Some(client);
        self
    }

    pub fn with_llm(mut self, llm: LLM, model: impl Into<String>) -> Self {
        self.llm = Some((llm, model.into()));
        self
    }

    pub fn from_config(config: &crate::config::Config, crossref: Arc<CrossRefClient>) -> AppResult<Self> {
        let mut agent = Self::new(crossref, config.search.max_results);

        if let Some(client) = SemanticScholarClient::from_config(&config.search)? {
            agent = agent.with_semantic_scholar(client);
        }
        if let Some(client) = ArxivClient::from_config(&config.search)? {
            agent = agent.with_arxiv(client);
        }
        match LLMProviderConfig::from_config(&config.llm) {
            Some(provider) => {
                agent = agent.with_llm(LLM::new(provider)?, config.llm.default_model.clone());
            }
            None => warn!("No LLM API key configured, Scholar summaries will be title digests"),
        }

        Ok(agent)
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// CrossRef first, then the secondary sources; duplicates by DOI or title are dropped
    pub async fn search_papers(&self, query: &str) -> AgentResult<Vec<Paper>> {
        let works = self
            .crossref
            .search_works(query, self.max_results, WorkSort::Relevance)
            .await?;
        let mut papers: Vec<Paper> = works.iter().map(|w| w.to_paper()).collect();

        if let Some(client) = &self.semantic_scholar {
            match client.search_papers(query, self.max_results).await {
                Ok(found) => papers.extend(found),
                Err(e) => warn!(error = %e, "Semantic Scholar search failed, continuing without it"),
            }
        }
        if let Some(client) = &self.arxiv {
            match client.search(query, self.max_results).await {
                Ok(found) => papers.extend(found),
                Err(e) => warn!(error = %e, "arXiv search failed, continuing without it"),
            }
        }

        Ok(dedup_papers(papers))
    }

    async fn summarize(&self, query: &str, papers: &[Paper]) -> String {
        let Some((llm, model)) = &self.llm else {
            return title_digest(query, papers);
        };

        let request = LLMRequest {
            model: model.clone(),
            messages: vec![LLMMessage::user(summary_prompt(query, papers))],
            max_tokens: Some(1000),
            temperature: Some(0.5),
            system_instruction: Some(
                "You are a research assistant that summarizes academic literature. Use only the information in the provided papers.".to_string(),
            ),
        };

        match llm.create_chat_completion(&request).await {
            Ok(response) => match parse_summary(&response.content) {
                Ok(summary) if !summary.is_empty() => summary,
                Ok(_) => title_digest(query, papers),
                Err(e) => {
                    warn!(error = %e, "Could not parse structured summary, using raw text");
                    response.content.trim().to_string()
                }
            },
            Err(e) => {
                warn!(error = %e, "LLM summary failed, falling back to title digest");
                title_digest(query, papers)
            }
        }
    }
}

#[async_trait]
impl Agent for ScholarAgent {
    fn name(&self) -> &str {
        "Scholar"
    }

    async fn process_query(&self, query: &str) -> AgentResult<Value> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentError::InvalidInput("Empty research query".to_string()));
        }
        info!(query = %query, "Scholar agent searching");

        let papers = self.search_papers(query).await?;
        if papers.is_empty() {
            return Ok(json!({
                "summary": format!("No papers found for '{}'.", query),
                "sources": [],
                "error": null,
            }));
        }

        let summary = self.summarize(query, &papers).await;
        let sources: Vec<String> = papers.iter().map(Paper::source_line).collect();
        info!(source_count = sources.len(), "Scholar agent finished");

        Ok(json!({
            "summary": summary,
            "sources": sources,
            "error": null,
        }))
    }
}

fn dedup_papers(papers: Vec<Paper>) -> Vec<Paper> {
    let mut seen = HashSet::new();
    papers
        .into_iter()
        .filter(|p| {
            let key = match &p.doi {
                Some(doi) => doi.to_lowercase(),
                None => p.title.to_lowercase(),
            };
            seen.insert(key)
        })
        .collect()
}

fn title_digest(query: &str, papers: &[Paper]) -> String {
    let mut digest = format!("Found {} papers for '{}':", papers.len(), query);
    for paper in papers {
        digest.push_str("\n- ");
        digest.push_str(&paper.source_line());
    }
    digest
}

fn summary_prompt(query: &str, papers: &[Paper]) -> String {
    let mut literature = String::new();
    for paper in papers {
        let abstract_text: String = paper
            .abstract_text
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(ABSTRACT_CHARS)
            .collect();
        literature.push_str(&format!(
            "Title: {}\nAuthors: {}\nAbstract: {}\n\n",
            paper.title,
            paper.author_line(),
            abstract_text
        ));
    }

    format!(
        r#"Summarize the following literature for the research question "{query}".

{literature}Respond with a JSON object with exactly these string fields:
{{"key_findings": "...", "methodology": "...", "contradictions": "...", "additional_notes": "...", "gaps_in_literature": "..."}}"#
    )
}

fn parse_summary(response: &str) -> anyhow::Result<String> {
    let json_str = if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    };

    let parsed: LiteratureSummary = serde_json::from_str(json_str)
        .map_err(|e| anyhow::anyhow!("Failed to parse summary JSON: {}", e))?;
    Ok(parsed.render())
}
