// arXiv API client (Atom feed)

use serde::Deserialize;
use tracing::info;

use super::http::{ClientSettings, HttpBackend};
use super::{Paper, PaperSource, SearchError};

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    title: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@title", default)]
    title: Option<String>,
}

/// Collapse the hard line wraps arXiv puts in titles and abstracts
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl From<Entry> for Paper {
    fn from(entry: Entry) -> Self {
        let doi_link = entry
            .links
            .iter()
            .find(|l| l.title.as_deref() == Some("doi"))
            .map(|l| l.href.clone());

        Paper {
            title: normalize_whitespace(&entry.title),
            authors: entry.authors.into_iter().map(|a| a.name.trim().to_string()).collect(),
            year: entry
                .published
                .as_deref()
                .and_then(|p| p.get(..4))
                .and_then(|y| y.parse().ok()),
            abstract_text: entry.summary.as_deref().map(normalize_whitespace),
            doi: doi_link.as_deref().and_then(super::extract_doi),
            url: Some(entry.id.trim().to_string()),
            venue: Some("arXiv".to_string()),
            source: PaperSource::Arxiv,
        }
    }
}

pub(crate) fn parse_feed(xml: &str) -> Result<Vec<Paper>, SearchError> {
    let feed: Feed =
        quick_xml::de::from_str(xml).map_err(|e| SearchError::ParseError(e.to_string()))?;
    Ok(feed.entries.into_iter().map(Paper::from).collect())
}

pub struct ArxivClient {
    http: HttpBackend,
}

impl ArxivClient {
    pub fn new(base_url: &str, settings: &ClientSettings) -> Result<Self, SearchError> {
        Ok(Self {
            http: HttpBackend::new(base_url, settings)?,
        })
    }

    /// `None` when arXiv is disabled in configuration
    pub fn from_config(config: &crate::config::SearchConfig) -> Result<Option<Self>, SearchError> {
        if !config.arxiv_enabled {
            return Ok(None);
        }
        Self::new(&config.arxiv_base_url, &ClientSettings::from_config(config)).map(Some)
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>, SearchError> {
        info!(query = %query, max_results, "Searching arXiv");

        let params = [
            ("search_query", format!("all:{}", query)),
            ("start", "0".to_string()),
            ("max_results", max_results.to_string()),
        ];
        let body = self.http.get_text("/api/query", &params, &[]).await?;
        let papers = parse_feed(&body)?;

        info!(count = papers.len(), "arXiv search completed");
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::http::test_settings;
    use mockito::{Matcher, Server};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <link href="http://arxiv.org/api/query" rel="self" type="application/atom+xml"/>
  <title type="html">ArXiv Query</title>
  <id>http://arxiv.org/api/abc</id>
  <updated>2024-01-01T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:41:18Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on complex
      recurrent or convolutional neural networks.</summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <link title="doi" href="http://dx.doi.org/10.48550/arXiv.1706.03762" rel="related"/>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let papers = parse_feed(FEED).unwrap();
        assert_eq!(papers.len(), 1);

        let paper = &papers[0];
        assert_eq!(paper.title, "Attention Is All You Need");
        assert_eq!(paper.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(paper.year, Some(2017));
        assert_eq!(paper.doi.as_deref(), Some("10.48550/arXiv.1706.03762"));
        assert!(paper.abstract_text.as_deref().unwrap().starts_with("The dominant sequence"));
    }

    #[test]
    fn test_parse_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>ArXiv Query</title></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::UrlEncoded("search_query".into(), "all:transformers".into()))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(FEED)
            .create_async()
            .await;

        let client = ArxivClient::new(&server.url(), &test_settings()).unwrap();
        let papers = client.search("transformers", 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(papers[0].source, PaperSource::Arxiv);
    }
}
