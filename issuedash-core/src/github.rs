//! HTTP client for the GitHub issue search API.
//!
//! Query execution only needs one operation, a paged issue search, so
//! the client surface is a single trait. The query layer holds the
//! tracker behind `dyn IssueSearch`, which is also the seam tests use
//! to substitute a canned result set.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;

use crate::error::{Error, Result};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const DEFAULT_API_ROOT: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One page of search results.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    /// Total matches for the whole query, not just this page.
    pub total_count: u64,
    /// Raw issue objects as returned by the tracker.
    pub items: Vec<serde_json::Value>,
}

/// A paged issue search against some tracker.
pub trait IssueSearch: Send + Sync {
    /// Fetch one page of results for `query`. Pages are 1-based.
    fn search<'a>(
        &'a self,
        query: &'a str,
        per_page: u32,
        page: u32,
    ) -> BoxFuture<'a, Result<SearchPage>>;
}

/// GitHub implementation of [`IssueSearch`] over the REST search API.
pub struct GithubSearchClient {
    http_client: reqwest::Client,
    api_root: String,
}

impl GithubSearchClient {
    /// Create a client, optionally authenticated with a token.
    pub fn new(token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("issuedash"));

        if let Some(token) = token {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid token: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_root: DEFAULT_API_ROOT.to_string(),
        })
    }

    /// Point the client at a different API root (GitHub Enterprise, or a
    /// local stub in tests).
    pub fn with_api_root(mut self, api_root: &str) -> Self {
        self.api_root = api_root.trim_end_matches('/').to_string();
        self
    }

    async fn search_page(&self, query: &str, per_page: u32, page: u32) -> Result<SearchPage> {
        let url = format!("{}/search/issues", self.api_root);

        tracing::debug!(query, per_page, page, "searching issues");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("q", query),
                ("per_page", &per_page.to_string()),
                ("page", &page.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let result: SearchPage = response
                .json()
                .await
                .map_err(|e| Error::Tracker(format!("failed to parse response: {}", e)))?;
            Ok(result)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Tracker(format!("API error ({}): {}", status, error_text)))
        }
    }
}

impl IssueSearch for GithubSearchClient {
    fn search<'a>(
        &'a self,
        query: &'a str,
        per_page: u32,
        page: u32,
    ) -> BoxFuture<'a, Result<SearchPage>> {
        Box::pin(self.search_page(query, per_page, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_without_token() {
        assert!(GithubSearchClient::new(None).is_ok());
    }

    #[test]
    fn test_client_rejects_malformed_token() {
        assert!(GithubSearchClient::new(Some("bad\ntoken")).is_err());
        assert!(GithubSearchClient::new(Some("ghp_abc123")).is_ok());
    }

    #[test]
    fn test_api_root_override_trims_trailing_slash() {
        let client = GithubSearchClient::new(None)
            .expect("client")
            .with_api_root("https://ghe.example.com/api/v3/");
        assert_eq!(client.api_root, "https://ghe.example.com/api/v3");
    }

    #[test]
    fn test_search_page_deserializes() {
        let page: SearchPage = serde_json::from_value(serde_json::json!({
            "total_count": 2,
            "items": [{"number": 1}, {"number": 2}],
        }))
        .expect("page");
        assert_eq!(page.total_count, 2);
        assert_eq!(page.items.len(), 2);
    }
}
