//! CrossRef Client
//!
//! Works search (`/works?query=`) and DOI lookup (`/works/{doi}`) against the
//! CrossRef REST API. Used by the Scholar, FactCheck and Citation agents.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::http::{ClientSettings, HttpBackend};
use super::{Paper, PaperSource, SearchError};

pub const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// A single work record as returned by CrossRef
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossRefWork {
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub author: Vec<CrossRefAuthor>,
    #[serde(rename = "container-title", default)]
    pub container_title: Vec<String>,
    #[serde(rename = "type", default)]
    pub work_type: Option<String>,
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
    #[serde(rename = "DOI", default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub created: Option<DateParts>,
    #[serde(rename = "published-print", default)]
    pub published_print: Option<DateParts>,
    #[serde(rename = "published-online", default)]
    pub published_online: Option<DateParts>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossRefAuthor {
    #[serde(default)]
    pub given: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    /// Organizational authors carry a single `name`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub affiliation: Vec<Affiliation>,
}

impl CrossRefAuthor {
    pub fn full_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.trim().to_string();
        }
        let given = self.given.as_deref().unwrap_or("").trim();
        let family = self.family.as_deref().unwrap_or("").trim();
        format!("{} {}", given, family).trim().to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Affiliation {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateParts {
    #[serde(rename = "date-parts", default)]
    pub date_parts: Vec<Vec<Option<i32>>>,
}

impl DateParts {
    fn parts(&self) -> Vec<i32> {
        self.date_parts
            .first()
            .map(|p| p.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    pub fn year(&self) -> Option<i32> {
        self.parts().first().copied()
    }

    /// `2020-3-14` style rendering, as CrossRef date parts are unpadded
    pub fn render(&self) -> Option<String> {
        let parts = self.parts();
        if parts.is_empty() {
            return None;
        }
        Some(parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join("-"))
    }
}

impl CrossRefWork {
    /// Multiple title entries are joined with `; `
    pub fn display_title(&self) -> String {
        if self.title.is_empty() {
            "Unknown title".to_string()
        } else {
            self.title.join("; ")
        }
    }

    pub fn journal(&self) -> Option<&str> {
        self.container_title.first().map(String::as_str)
    }

    pub fn author_names(&self) -> Vec<String> {
        self.author
            .iter()
            .map(CrossRefAuthor::full_name)
            .filter(|n| !n.is_empty())
            .collect()
    }

    /// Publication year: print date, then online date
    pub fn year(&self) -> Option<i32> {
        self.published_print
            .as_ref()
            .and_then(DateParts::year)
            .or_else(|| self.published_online.as_ref().and_then(DateParts::year))
    }

    pub fn to_paper(&self) -> Paper {
        Paper {
            title: self.display_title(),
            authors: self.author_names(),
            year: self.year(),
            abstract_text: self.abstract_text.clone(),
            doi: self.doi.clone(),
            url: self.url.clone(),
            venue: self.journal().map(String::from),
            source: PaperSource::CrossRef,
        }
    }
}

#[derive(Deserialize)]
struct WorkListEnvelope {
    message: WorkList,
}

#[derive(Deserialize)]
struct WorkList {
    #[serde(default)]
    items: Vec<CrossRefWork>,
}

#[derive(Deserialize)]
struct WorkEnvelope {
    message: CrossRefWork,
}

/// Sort key for `/works` queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkSort {
    Relevance,
    Score,
}

impl WorkSort {
    fn as_str(&self) -> &'static str {
        match self {
            WorkSort::Relevance => "relevance",
            WorkSort::Score => "score",
        }
    }
}

pub struct CrossRefClient {
    http: HttpBackend,
}

impl CrossRefClient {
    pub fn new(base_url: &str, settings: &ClientSettings) -> Result<Self, SearchError> {
        Ok(Self {
            http: HttpBackend::new(base_url, settings)?,
        })
    }

    pub fn from_config(config: &crate::config::SearchConfig) -> Result<Self, SearchError> {
        Self::new(&config.crossref_base_url, &ClientSettings::from_config(config))
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Search works matching free text
    pub async fn search_works(
        &self,
        query: &str,
        rows: usize,
        sort: WorkSort,
    ) -> Result<Vec<CrossRefWork>, SearchError> {
        info!(query = %query, rows, "Searching CrossRef");

        let params = [
            ("query", query.to_string()),
            ("rows", rows.to_string()),
            ("sort", sort.as_str().to_string()),
        ];
        let envelope: WorkListEnvelope = self.http.get_json("/works", &params, &[]).await?;

        info!(count = envelope.message.items.len(), "CrossRef search completed");
        Ok(envelope.message.items)
    }

    /// Look up a single work by DOI; `None` when CrossRef does not know it
    pub async fn work_by_doi(&self, doi: &str) -> Result<Option<CrossRefWork>, SearchError> {
        debug!(doi = %doi, "Fetching CrossRef metadata");

        let path = format!("/works/{}", doi.trim());
        match self.http.get_json::<WorkEnvelope>(&path, &[], &[]).await {
            Ok(envelope) => {
                let mut work = envelope.message;
                work.doi.get_or_insert_with(|| doi.trim().to_string());
                Ok(Some(work))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_WORK: &str = r#"{
    "title": ["Deep learning"],
    "author": [
        {"given": "Yann", "family": "LeCun", "affiliation": [{"name": "NYU"}]},
        {"given": "Yoshua", "family": "Bengio", "affiliation": []},
        {"given": "Geoffrey", "family": "Hinton", "affiliation": []}
    ],
    "container-title": ["Nature"],
    "type": "journal-article",
    "URL": "http://dx.doi.org/10.1038/nature14539",
    "DOI": "10.1038/nature14539",
    "created": {"date-parts": [[2015, 5, 27]]},
    "published-print": {"date-parts": [[2015, 5]]},
    "abstract": "Deep learning allows computational models..."
}"#;
