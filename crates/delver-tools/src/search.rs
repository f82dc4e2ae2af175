use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use delver_core::config::SearchConfig;
use delver_core::error::{DelverError, Result};
use delver_core::traits::SearchProvider;
use delver_core::types::SearchHit;

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Build the search provider named in the config.
pub fn create_search_provider(config: &SearchConfig) -> Result<Arc<dyn SearchProvider>> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| DelverError::Config(format!("search: api_key is required for {}", config.provider)))?;

    match config.provider.as_str() {
        "serper" => Ok(Arc::new(SerperSearch::new(api_key, config)?)),
        "tavily" => Ok(Arc::new(TavilySearch::new(api_key, config)?)),
        other => Err(DelverError::Config(format!(
            "unknown search provider '{}' (expected serper or tavily)",
            other
        ))),
    }
}

fn build_http(config: &SearchConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| DelverError::Config(format!("failed to build HTTP client: {}", e)))
}

fn search_error(provider: &str, message: impl Into<String>) -> DelverError {
    DelverError::Search {
        provider: provider.to_string(),
        message: message.into(),
    }
}

/// POST a JSON body and decode the JSON reply, mapping every failure to
/// `DelverError::Search`.
async fn post_json<T: for<'de> Deserialize<'de>>(
    request: reqwest::RequestBuilder,
    provider: &str,
) -> Result<T> {
    let resp = request
        .send()
        .await
        .map_err(|e| search_error(provider, e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(search_error(provider, format!("HTTP {}: {}", status.as_u16(), body)));
    }

    resp.json()
        .await
        .map_err(|e| search_error(provider, format!("invalid response: {}", e)))
}

// ── Serper ───────────────────────────────────────────────────────

/// Google results through serper.dev.
pub struct SerperSearch {
    api_key: String,
    endpoint: String,
    max_results: usize,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Deserialize)]
struct SerperResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>, config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            endpoint: SERPER_ENDPOINT.to_string(),
            max_results: config.max_results,
            http: build_http(config)?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl SearchProvider for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    fn search(&self, query: &str) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let query = query.to_string();
        Box::pin(async move {
            debug!(query = %query, "Serper search");
            let request = self
                .http
                .post(&self.endpoint)
                .header("X-API-KEY", &self.api_key)
                .json(&json!({ "q": query, "num": self.max_results }));

            let body: SerperResponse = post_json(request, self.name()).await?;
            Ok(body
                .organic
                .into_iter()
                .map(|r| SearchHit {
                    title: r.title,
                    url: r.link,
                    snippet: r.snippet,
                })
                .collect())
        })
    }
}

// ── Tavily ───────────────────────────────────────────────────────

/// Tavily search API.
pub struct TavilySearch {
    api_key: String,
    endpoint: String,
    max_results: usize,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            endpoint: TAVILY_ENDPOINT.to_string(),
            max_results: config.max_results,
            http: build_http(config)?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    fn search(&self, query: &str) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let query = query.to_string();
        Box::pin(async move {
            debug!(query = %query, "Tavily search");
            let request = self.http.post(&self.endpoint).json(&json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
            }));

            let body: TavilyResponse = post_json(request, self.name()).await?;
            Ok(body
                .results
                .into_iter()
                .map(|r| SearchHit {
                    title: r.title,
                    url: r.url,
                    snippet: r.content,
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(provider: &str) -> SearchConfig {
        SearchConfig {
            provider: provider.to_string(),
            api_key: Some("key".into()),
            ..SearchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_serper_maps_organic_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-API-KEY", "key"))
            .and(body_partial_json(json!({ "q": "rust graphs" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [
                    { "title": "A", "link": "https://a.example", "snippet": "first" },
                    { "title": "B", "link": "https://b.example", "snippet": "second", "position": 2 }
                ]
            })))
            .mount(&server)
            .await;

        let serper = SerperSearch::new("key", &config("serper"))
            .unwrap()
            .with_endpoint(server.uri());
        let hits = serper.search("rust graphs").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://a.example");
        assert_eq!(hits[1].snippet, "second");
    }

    #[tokio::test]
    async fn test_tavily_maps_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "title": "T", "url": "https://t.example", "content": "body" }]
            })))
            .mount(&server)
            .await;

        let tavily = TavilySearch::new("key", &config("tavily"))
            .unwrap()
            .with_endpoint(server.uri());
        let hits = tavily.search("q").await.unwrap();
        assert_eq!(hits[0].snippet, "body");
    }

    #[tokio::test]
    async fn test_http_error_is_search_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quota"))
            .mount(&server)
            .await;

        let serper = SerperSearch::new("key", &config("serper"))
            .unwrap()
            .with_endpoint(server.uri());
        match serper.search("q").await {
            Err(DelverError::Search { provider, message }) => {
                assert_eq!(provider, "serper");
                assert!(message.contains("403"));
            }
            other => panic!("expected search error, got {:?}", other.map(|h| h.len())),
        }
    }

    #[test]
    fn test_factory_requires_key_and_known_provider() {
        assert!(create_search_provider(&config("serper")).is_ok());
        assert!(create_search_provider(&config("tavily")).is_ok());
        assert!(create_search_provider(&config("bing")).is_err());
        assert!(create_search_provider(&SearchConfig::default()).is_err());
    }
}
