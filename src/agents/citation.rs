//! Citation Agent
//!
//! Formats APA, MLA and IEEE citations from CrossRef metadata. A query that
//! contains a DOI is cited directly; anything else is searched on CrossRef and
//! the top matches are cited. The style is picked by the query's last word.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{Agent, AgentError, AgentResult};
use crate::search::crossref::{DateParts, WorkSort};
use crate::search::{extract_doi, CrossRefClient, CrossRefWork};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    #[default]
    Apa,
    Mla,
    Ieee,
}

impl CitationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CitationStyle::Apa => "APA",
            CitationStyle::Mla => "MLA",
            CitationStyle::Ieee => "IEEE",
        }
    }

    /// Split a trailing style keyword off `text`, e.g. `"... mla"`
    pub fn split_trailing(text: &str) -> (Option<Self>, &str) {
        let trimmed = text.trim_end();
        if let Some((rest, last)) = trimmed.rsplit_once(char::is_whitespace) {
            if let Ok(style) = last.parse() {
                return (Some(style), rest.trim_end());
            }
        } else if let Ok(style) = trimmed.parse() {
            return (Some(style), "");
        }
        (None, trimmed)
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CitationStyle {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "apa" => Ok(CitationStyle::Apa),
            "mla" => Ok(CitationStyle::Mla),
            "ieee" => Ok(CitationStyle::Ieee),
            other => Err(AgentError::InvalidInput(format!("Unsupported citation style: {}", other))),
        }
    }
}

/// `A`, `A, & B`, `A, B, & C`
fn author_list(names: &[String]) -> String {
    match names {
        [] => "Unknown Authors".to_string(),
        [only] => only.clone(),
        [init @ .., last] => format!("{}, & {}", init.join(", "), last),
    }
}

pub fn format_citation(work: &CrossRefWork, style: CitationStyle) -> String {
    let authors = author_list(&work.author_names());
    let title = work
        .title
        .first()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .unwrap_or(UNKNOWN);
    let date = work
        .created
        .as_ref()
        .and_then(DateParts::render)
        .unwrap_or_else(|| UNKNOWN.to_string());
    let url = work.url.as_deref().unwrap_or(UNKNOWN);
    let doi = work.doi.as_deref().unwrap_or(UNKNOWN);

    match (style, work.journal()) {
        (CitationStyle::Apa, Some(journal)) => {
            format!("{} ({}). {}. *{}*. DOI: {}", authors, date, title, journal, doi)
        }
        (CitationStyle::Apa, None) => {
            format!("{} ({}). {}. Retrieved from {}", authors, date, title, url)
        }
        (CitationStyle::Mla, Some(journal)) => {
            format!("{}. \"{}.\" *{}*, {}, {}.", authors, title, journal, date, url)
        }
        (CitationStyle::Mla, None) => format!("{}. \"{}.\" {}, {}.", authors, title, date, url),
        (CitationStyle::Ieee, Some(journal)) => format!(
            "{}, \"{},\" *{}*, {}. [Online]. Available: {}.",
            authors, title, journal, date, url
        ),
        (CitationStyle::Ieee, None) => format!(
            "{}, \"{},\" {}. [Online]. Available: {}.",
            authors, title, date, url
        ),
    }
}

pub struct CitationAgent {
    crossref: Arc<CrossRefClient>,
    max_results: usize,
}

impl CitationAgent {
    pub fn new(crossref: Arc<CrossRefClient>, max_results: usize) -> Self {
        Self {
            crossref,
            max_results: max_results.max(1),
        }
    }

    /// Cite a DOI found in `text`, or the top CrossRef matches for it
    pub async fn cite(&self, text: &str, style: CitationStyle) -> AgentResult<Vec<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::InvalidInput("Nothing to cite".to_string()));
        }

        if let Some(doi) = extract_doi(text) {
            info!(doi = %doi, style = %style, "Citing DOI");
            return match self.crossref.work_by_doi(&doi).await? {
                Some(work) => Ok(vec![format_citation(&work, style)]),
                None => Err(AgentError::InvalidInput(format!("DOI not found: {}", doi))),
            };
        }

        info!(style = %style, "Citing top CrossRef matches");
        let works = self
            .crossref
            .search_works(text, self.max_results, WorkSort::Relevance)
            .await?;
        Ok(works.iter().map(|w| format_citation(w, style)).collect())
    }
}

#[async_trait]
impl Agent for CitationAgent {
    fn name(&self) -> &str {
        "Citation"
    }

    async fn process_query(&self, query: &str) -> AgentResult<Value> {
        let (style, text) = CitationStyle::split_trailing(query);
        let style = style.unwrap_or_default();
        let citations = self.cite(text, style).await?;

        Ok(json!({
            "citations": citations,
            "style": style.as_str(),
            "error": null,
        }))
    }
}
