// Shared HTTP plumbing for the search clients

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use tracing::debug;

use super::SearchError;
use crate::utils::{with_retry, RetryPolicy};

const USER_AGENT: &str = concat!("thesys/", env!("CARGO_PKG_VERSION"));

/// Connection settings shared by every search client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub requests_per_second: u32,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    /// Contact address appended to the user agent (CrossRef polite pool)
    pub mailto: Option<String>,
}

impl ClientSettings {
    pub fn from_config(config: &crate::config::SearchConfig) -> Self {
        Self {
            requests_per_second: config.requests_per_second,
            retry: RetryPolicy::new(config.retry_attempts),
            timeout: Duration::from_secs(config.request_timeout_secs),
            mailto: config.crossref_mailto.clone(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from_config(&crate::config::SearchConfig::default())
    }
}

pub(crate) struct HttpBackend {
    client: Client,
    base_url: String,
    limiter: Arc<DefaultDirectRateLimiter>,
    retry: RetryPolicy,
}

impl HttpBackend {
    pub(crate) fn new(base_url: &str, settings: &ClientSettings) -> Result<Self, SearchError> {
        let user_agent = match &settings.mailto {
            Some(mailto) => format!("{} (mailto:{})", USER_AGENT, mailto),
            None => USER_AGENT.to_string(),
        };

        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| SearchError::RequestFailed(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
            retry: settings.retry,
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` relative to the base URL and return the response body
    pub(crate) async fn get_text(
        &self,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<String, SearchError> {
        let url = format!("{}{}", self.base_url, path);
        let url = url.as_str();

        with_retry(&self.retry, move || async move {
            self.limiter.until_ready().await;
            debug!(url = %url, "Search API request");

            let mut request = self.client.get(url).query(query);
            for (name, value) in headers {
                request = request.header(*name, value);
            }

            let response = request
                .send()
                .await
                .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

            if !status.is_success() {
                return Err(SearchError::Http {
                    status: status.as_u16(),
                    message: body.chars().take(200).collect(),
                });
            }

            Ok(body)
        })
        .await
    }

    pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<T, SearchError> {
        let body = self.get_text(path, query, headers).await?;
        serde_json::from_str(&body).map_err(|e| SearchError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> ClientSettings {
    ClientSettings {
        requests_per_second: 1_000,
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        timeout: Duration::from_secs(5),
        mailto: None,
    }
}
