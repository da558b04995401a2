// NewsAPI client

use serde::{Deserialize, Serialize};
use tracing::info;

use super::http::{ClientSettings, HttpBackend};
use super::SearchError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: Option<NewsSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSource {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(rename = "totalResults", default)]
    total_results: u64,
    #[serde(default)]
    articles: Vec<NewsArticle>,
    #[serde(default)]
    message: Option<String>,
}

/// Articles matching a query plus the total NewsAPI reports
#[derive(Debug, Clone)]
pub struct NewsCoverage {
    pub total_results: u64,
    pub articles: Vec<NewsArticle>,
}

pub struct NewsApiClient {
    http: HttpBackend,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(base_url: &str, api_key: String, settings: &ClientSettings) -> Result<Self, SearchError> {
        if api_key.is_empty() {
            return Err(SearchError::NoApiKey("NewsAPI"));
        }
        Ok(Self {
            http: HttpBackend::new(base_url, settings)?,
            api_key,
        })
    }

    /// `None` when no NewsAPI key is configured
    pub fn from_config(config: &crate::config::SearchConfig) -> Result<Option<Self>, SearchError> {
        match &config.newsapi_key {
            Some(key) => Self::new(
                &config.newsapi_base_url,
                key.clone(),
                &ClientSettings::from_config(config),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    pub async fn search_everything(&self, query: &str, page_size: usize) -> Result<NewsCoverage, SearchError> {
        info!(query = %query, "Searching NewsAPI");

        let params = [
            ("q", query.to_string()),
            ("pageSize", page_size.to_string()),
            ("sortBy", "relevancy".to_string()),
            ("language", "en".to_string()),
        ];
        let headers = [("X-Api-Key", self.api_key.clone())];

        let response: EverythingResponse = self.http.get_json("/v2/everything", &params, &headers).await?;
        if response.status != "ok" {
            return Err(SearchError::RequestFailed(
                response.message.unwrap_or_else(|| "NewsAPI returned an error".to_string()),
            ));
        }

        info!(total = response.total_results, "NewsAPI search completed");
        Ok(NewsCoverage {
            total_results: response.total_results,
            articles: response.articles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::http::test_settings;
    use mockito::{Matcher, Server};

    #[test]
    fn test_missing_key_is_rejected() {
        let result = NewsApiClient::new("http://localhost", String::new(), &test_settings());
        assert!(matches!(result, Err(SearchError::NoApiKey(_))));
    }

    #[tokio::test]
    async fn test_search_everything() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/everything")
            .match_query(Matcher::UrlEncoded("q".into(), "coffee health".into()))
            .match_header("x-api-key", "news-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"ok","totalResults":2,"articles":[
                    {"source":{"id":null,"name":"Reuters"},"title":"Coffee study","description":null,
                     "url":"https://example.com/a","publishedAt":"2024-01-01T00:00:00Z"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = NewsApiClient::new(&server.url(), "news-key".to_string(), &test_settings()).unwrap();
        let coverage = client.search_everything("coffee health", 5).await.unwrap();

        mock.assert_async().await;
        assert_eq!(coverage.total_results, 2);
        assert_eq!(coverage.articles[0].title, "Coffee study");
    }
}
