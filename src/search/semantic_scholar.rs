// Semantic Scholar Graph API client

use serde::Deserialize;
use tracing::info;

use super::http::{ClientSettings, HttpBackend};
use super::{Paper, PaperSource, SearchError};

const SEARCH_FIELDS: &str = "title,authors,year,abstract,externalIds,url,venue";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Deserialize)]
struct S2Paper {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(rename = "abstract", default)]
    abstract_text: Option<String>,
    #[serde(rename = "externalIds", default)]
    external_ids: Option<ExternalIds>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    venue: Option<String>,
}

#[derive(Deserialize)]
struct S2Author {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI", default)]
    doi: Option<String>,
}

impl From<S2Paper> for Paper {
    fn from(p: S2Paper) -> Self {
        Paper {
            title: p.title.unwrap_or_else(|| "Untitled".to_string()),
            authors: p.authors.into_iter().filter_map(|a| a.name).collect(),
            year: p.year,
            abstract_text: p.abstract_text,
            doi: p.external_ids.and_then(|ids| ids.doi),
            url: p.url,
            venue: p.venue.filter(|v| !v.is_empty()),
            source: PaperSource::SemanticScholar,
        }
    }
}

pub struct SemanticScholarClient {
    http: HttpBackend,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        settings: &ClientSettings,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            http: HttpBackend::new(base_url, settings)?,
            api_key,
        })
    }

    /// `None` when Semantic Scholar is disabled in configuration
    pub fn from_config(config: &crate::config::SearchConfig) -> Result<Option<Self>, SearchError> {
        if !config.semantic_scholar_enabled {
            return Ok(None);
        }
        Self::new(
            &config.semantic_scholar_base_url,
            config.semantic_scholar_api_key.clone(),
            &ClientSettings::from_config(config),
        )
        .map(Some)
    }

    pub async fn search_papers(&self, query: &str, limit: usize) -> Result<Vec<Paper>, SearchError> {
        info!(query = %query, limit, "Searching Semantic Scholar");

        let params = [
            ("query", query.to_string()),
            ("limit", limit.to_string()),
            ("fields", SEARCH_FIELDS.to_string()),
        ];
        let headers: Vec<(&str, String)> = self
            .api_key
            .iter()
            .map(|key| ("x-api-key", key.clone()))
            .collect();

        let response: SearchResponse = self
            .http
            .get_json("/graph/v1/paper/search", &params, &headers)
            .await?;

        let papers: Vec<Paper> = response.data.into_iter().map(Paper::from).collect();
        info!(count = papers.len(), "Semantic Scholar search completed");
        Ok(papers)
    }
}
