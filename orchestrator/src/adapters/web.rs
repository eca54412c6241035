use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use super::WebSearch;
use crate::error::AdapterError;

pub const UNKNOWN_TITLE: &str = "제목 없음";
pub const UNKNOWN_URL: &str = "URL 미기재";

#[derive(Debug, Clone, PartialEq)]
pub struct WebDoc {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Tavily search API client.
pub struct TavilyClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: String,
}

impl TavilyClient {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<WebDoc>, AdapterError> {
        info!("Web: searching {:?} (k={})", query, k);

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "api_key": self.api_key.as_deref().unwrap_or_default(),
                "query": query,
                "max_results": k,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                service: "tavily",
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let data: SearchResponse = resp.json().await?;
        Ok(data
            .results
            .into_iter()
            .take(k)
            .map(|r| WebDoc {
                title: r.title.filter(|t| !t.is_empty()).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                url: r.url.filter(|u| !u.is_empty()).unwrap_or_else(|| UNKNOWN_URL.to_string()),
                snippet: r.content,
            })
            .collect())
    }
}
