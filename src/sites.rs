//! Keyword to URL resolution through the backend's site directory.

use serde::{Deserialize, Serialize};

use crate::compare::is_http_url;
use crate::interval::client::join_url;

#[derive(Debug, thiserror::Error)]
pub enum SiteSearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("site search endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("site search failed: {0}")]
    Rejected(String),

    #[error("no site matches \"{0}\"")]
    NoResults(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(default)]
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub usage_count: i64,
    #[serde(default)]
    pub average_rtt: f64,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSearchResult {
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub results: Vec<Site>,
    #[serde(default)]
    pub total_found: usize,
}

#[derive(Debug, Deserialize)]
struct SiteSearchEnvelope {
    #[serde(default)]
    success: bool,
    data: Option<SiteSearchResult>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SiteSearchClient {
    url: String,
    client: reqwest::Client,
}

impl SiteSearchClient {
    pub fn new(api_base: &str, path: &str) -> Self {
        Self {
            url: join_url(api_base, path),
            client: reqwest::Client::new(),
        }
    }

    /// `GET {path}?q=<term>&auto_discover=<bool>`.
    pub async fn search(
        &self,
        term: &str,
        auto_discover: bool,
    ) -> Result<SiteSearchResult, SiteSearchError> {
        let auto_discover = if auto_discover { "true" } else { "false" };
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", term), ("auto_discover", auto_discover)])
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SiteSearchError::Status { status, body });
        }

        let envelope: SiteSearchEnvelope = response.json().await?;
        match (envelope.success, envelope.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(SiteSearchError::Rejected(
                envelope
                    .error
                    .unwrap_or_else(|| "site search failed".to_string()),
            )),
        }
    }

    /// URLs pass through untouched; anything else is searched with
    /// auto-discovery and resolves to the best match.
    pub async fn resolve(&self, input: &str) -> Result<String, SiteSearchError> {
        let input = input.trim();
        if is_http_url(input) {
            return Ok(input.to_string());
        }

        let found = self.search(input, true).await?;
        match found.results.into_iter().next() {
            Some(site) => {
                log::info!("\"{}\" resolved to {} ({})", input, site.url, site.name);
                Ok(site.url)
            }
            None => Err(SiteSearchError::NoResults(input.to_string())),
        }
    }
}
