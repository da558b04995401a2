use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub search: SearchConfig,
    pub bus: BusConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    /// Global inbound request budget; 0 disables the limiter
    pub requests_per_second: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            requests_per_second: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub openai_api_key: String,
    pub groq_api_key: String,
    pub openrouter_api_key: String,
    pub default_provider: String,
    pub default_model: String,
    /// Overrides the provider's default endpoint (OpenAI-compatible)
    pub api_base: Option<String>,
}

impl LLMConfig {
    /// API key for the configured default provider, if one is set
    pub fn active_api_key(&self) -> Option<String> {
        let key = match self.default_provider.as_str() {
            "groq" => &self.groq_api_key,
            "openrouter" => &self.openrouter_api_key,
            _ => &self.openai_api_key,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            groq_api_key: String::new(),
            openrouter_api_key: String::new(),
            default_provider: "openai".to_string(),
            default_model: "gpt-4o".to_string(),
            api_base: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub crossref_base_url: String,
    /// Contact address for the CrossRef "polite" pool
    pub crossref_mailto: Option<String>,
    pub semantic_scholar_enabled: bool,
    pub semantic_scholar_base_url: String,
    pub semantic_scholar_api_key: Option<String>,
    pub arxiv_enabled: bool,
    pub arxiv_base_url: String,
    pub newsapi_base_url: String,
    pub newsapi_key: Option<String>,
    pub max_results: usize,
    pub requests_per_second: u32,
    pub retry_attempts: u32,
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            crossref_base_url: "https://api.crossref.org".to_string(),
            crossref_mailto: None,
            semantic_scholar_enabled: true,
            semantic_scholar_base_url: "https://api.semanticscholar.org".to_string(),
            semantic_scholar_api_key: None,
            arxiv_enabled: true,
            arxiv_base_url: "http://export.arxiv.org".to_string(),
            newsapi_base_url: "https://newsapi.org".to_string(),
            newsapi_key: None,
            max_results: 3,
            requests_per_second: 5,
            retry_attempts: 3,
            request_timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Capacity of every per-agent inbox and of its uncollected-reply queue
    pub queue_capacity: usize,
    /// Default wait used by callers of `get_response`
    pub response_timeout_ms: u64,
}

impl BusConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            response_timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    pub cache_capacity: usize,
    /// 0 keeps entries until evicted by capacity
    pub cache_ttl_secs: u64,
    /// 0 disables the per-agent deadline
    pub agent_timeout_secs: u64,
}

impl OrchestratorConfig {
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }

    pub fn agent_timeout(&self) -> Option<Duration> {
        (self.agent_timeout_secs > 0).then(|| Duration::from_secs(self.agent_timeout_secs))
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
            cache_ttl_secs: 3_600,
            agent_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    /// Directory for daily rolling log files; stdout only when unset
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "thesys=debug,tower_http=debug,axum=debug".to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let search_defaults = SearchConfig::default();
        let bus_defaults = BusConfig::default();
        let orchestrator_defaults = OrchestratorConfig::default();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                requests_per_second: env::var("RATE_LIMIT_PER_SECOND")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()?,
            },
            llm: LLMConfig {
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                openrouter_api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                default_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
                default_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
                api_base: env::var("LLM_API_BASE").ok(),
            },
            search: SearchConfig {
                crossref_base_url: env::var("CROSSREF_BASE_URL")
                    .unwrap_or(search_defaults.crossref_base_url),
                crossref_mailto: env::var("CROSSREF_MAILTO").ok(),
                semantic_scholar_enabled: env::var("SEMANTIC_SCHOLAR_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                semantic_scholar_base_url: env::var("SEMANTIC_SCHOLAR_BASE_URL")
                    .unwrap_or(search_defaults.semantic_scholar_base_url),
                semantic_scholar_api_key: env::var("SEMANTIC_SCHOLAR_API_KEY").ok(),
                arxiv_enabled: env::var("ARXIV_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                arxiv_base_url: env::var("ARXIV_BASE_URL")
                    .unwrap_or(search_defaults.arxiv_base_url),
                newsapi_base_url: env::var("NEWSAPI_BASE_URL")
                    .unwrap_or(search_defaults.newsapi_base_url),
                newsapi_key: env::var("NEWSAPI_KEY").ok().filter(|k| !k.is_empty()),
                max_results: env::var("SEARCH_MAX_RESULTS")
                    .unwrap_or_else(|_| search_defaults.max_results.to_string())
                    .parse()?,
                requests_per_second: env::var("SEARCH_REQUESTS_PER_SECOND")
                    .unwrap_or_else(|_| search_defaults.requests_per_second.to_string())
                    .parse()?,
                retry_attempts: env::var("SEARCH_RETRY_ATTEMPTS")
                    .unwrap_or_else(|_| search_defaults.retry_attempts.to_string())
                    .parse()?,
                request_timeout_secs: env::var("SEARCH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| search_defaults.request_timeout_secs.to_string())
                    .parse()?,
            },
            bus: BusConfig {
                queue_capacity: env::var("BUS_QUEUE_CAPACITY")
                    .unwrap_or_else(|_| bus_defaults.queue_capacity.to_string())
                    .parse()?,
                response_timeout_ms: env::var("BUS_RESPONSE_TIMEOUT_MS")
                    .unwrap_or_else(|_| bus_defaults.response_timeout_ms.to_string())
                    .parse()?,
            },
            orchestrator: OrchestratorConfig {
                cache_capacity: env::var("WORKFLOW_CACHE_CAPACITY")
                    .unwrap_or_else(|_| orchestrator_defaults.cache_capacity.to_string())
                    .parse()?,
                cache_ttl_secs: env::var("WORKFLOW_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| orchestrator_defaults.cache_ttl_secs.to_string())
                    .parse()?,
                agent_timeout_secs: env::var("AGENT_TIMEOUT_SECS")
                    .unwrap_or_else(|_| orchestrator_defaults.agent_timeout_secs.to_string())
                    .parse()?,
            },
            logging: LoggingConfig {
                filter: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "thesys=debug,tower_http=debug,axum=debug".to_string()),
                log_dir: env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            },
        })
    }
}
