//! Search Module
//!
//! Clients for the external academic and news APIs the research agents rely on:
//! - CrossRef (primary) - scholarly works metadata, DOI lookups for citations
//! - Semantic Scholar (secondary) - paper search with abstracts
//! - arXiv (secondary) - preprints, Atom feed
//! - NewsAPI - news coverage used as a weak fact-checking signal
//!
//! Every client shares the same HTTP plumbing: a per-client rate limiter and
//! retry with exponential backoff on transient failures.

pub mod http;
pub mod crossref;
pub mod semantic_scholar;
pub mod arxiv;
pub mod newsapi;

pub use arxiv::ArxivClient;
pub use crossref::{CrossRefClient, CrossRefWork};
pub use http::ClientSettings;
pub use newsapi::{NewsApiClient, NewsArticle, NewsCoverage};
pub use semantic_scholar::SemanticScholarClient;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::Retryable;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("API key not configured for {0}")]
    NoApiKey(&'static str),

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {status} from search API: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse search results: {0}")]
    ParseError(String),
}

impl SearchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SearchError::Http { status: 404, .. })
    }
}

impl Retryable for SearchError {
    fn is_retryable(&self) -> bool {
        match self {
            SearchError::RequestFailed(_) => true,
            SearchError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Which API a paper came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperSource {
    CrossRef,
    SemanticScholar,
    Arxiv,
}

/// A paper normalized across search backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    pub source: PaperSource,
}

impl Paper {
    pub fn author_line(&self) -> String {
        if self.authors.is_empty() {
            "Unknown Authors".to_string()
        } else {
            self.authors.join(", ")
        }
    }

    /// One-line source description: `Title (2021), by A, B`
    pub fn source_line(&self) -> String {
        let year = self
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "UnknownYear".to_string());
        format!("{} ({}), by {}", self.title, year, self.author_line())
    }
}

/// First DOI found in free text, a `doi:` reference or a doi.org URL.
///
/// A DOI is `10.<registrant>/<suffix>` where the suffix runs to the next
/// whitespace or quote, so SICI suffixes keep their `<`, `>` and `;`.
pub fn extract_doi(text: &str) -> Option<String> {
    text.split_whitespace().find_map(doi_in_token)
}

fn doi_in_token(token: &str) -> Option<String> {
    let start = token.find("10.")?;
    let candidate = token[start..]
        .split(['"', '\''])
        .next()
        .unwrap_or_default();
    let (registrant, suffix) = candidate.split_once('/')?;

    let digits = &registrant[3..];
    if digits.len() < 4 || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    let suffix = trim_trailing_punctuation(suffix);
    (!suffix.is_empty()).then(|| format!("{}/{}", registrant, suffix))
}

/// Strip sentence punctuation, keeping a closing bracket the DOI itself opened
fn trim_trailing_punctuation(mut suffix: &str) -> &str {
    loop {
        let Some(last) = suffix.chars().last() else {
            return suffix;
        };
        let strip = match last {
            '.' | ',' | ';' | ':' | '>' => true,
            ')' => suffix.matches('(').count() < suffix.matches(')').count(),
            ']' => suffix.matches('[').count() < suffix.matches(']').count(),
            _ => false,
        };
        if !strip {
            return suffix;
        }
        suffix = &suffix[..suffix.len() - last.len_utf8()];
    }
}
