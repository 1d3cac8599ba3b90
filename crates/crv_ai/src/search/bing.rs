use std::time::Duration;

use crv_core::error::AppError;
use serde::Deserialize;

use super::SearchEngine;
use crate::client::http_error;

pub const DEFAULT_BING_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";

#[derive(Debug, Clone)]
pub struct BingSearch {
    endpoint: String,
    subscription_key: String,
    timeout: Duration,
}

impl BingSearch {
    pub fn new(subscription_key: impl Into<String>) -> Result<Self, AppError> {
        Self::with_endpoint(DEFAULT_BING_ENDPOINT, subscription_key)
    }

    pub fn with_endpoint(
        endpoint: &str,
        subscription_key: impl Into<String>,
    ) -> Result<Self, AppError> {
        let subscription_key = subscription_key.into();
        if subscription_key.trim().is_empty() {
            return Err(AppError::new(
                "SEARCH_CONFIG_INVALID",
                "Search subscription key is empty",
            ));
        }
        let endpoint = endpoint.trim().trim_end_matches('/');
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(AppError::new("SEARCH_CONFIG_INVALID", "Search endpoint must be http(s)")
                .with_details(format!("endpoint={endpoint}")));
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            subscription_key,
            timeout: Duration::from_secs(10),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(default, rename = "webPages")]
    web_pages: Option<WebPages>,
}

#[derive(Debug, Clone, Deserialize)]
struct WebPages {
    #[serde(default)]
    value: Vec<WebPage>,
}

#[derive(Debug, Clone, Deserialize)]
struct WebPage {
    url: String,
}

fn result_urls(resp: SearchResponse) -> Vec<String> {
    resp.web_pages
        .map(|w| w.value.into_iter().map(|p| p.url).collect())
        .unwrap_or_default()
}

impl SearchEngine for BingSearch {
    fn search(&self, query: &str) -> Result<Vec<String>, AppError> {
        let resp = ureq::get(&self.endpoint)
            .timeout(self.timeout)
            .set("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .query("q", query)
            .query("textDecorations", "true")
            .query("textFormat", "HTML")
            .call()
            .map_err(|e| http_error("SEARCH_FAILED", "Search request failed", e))?;

        let v: SearchResponse = resp.into_json().map_err(|e| {
            AppError::new("SEARCH_FAILED", "Failed to decode search response")
                .with_details(format!("query={query}; err={e}"))
        })?;
        Ok(result_urls(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_urls_in_rank_order() {
        let v: SearchResponse = serde_json::from_str(
            r#"{"webPages":{"value":[{"url":"https://a.example","name":"A"},{"url":"https://b.example"}]}}"#,
        )
        .expect("decode");
        assert_eq!(result_urls(v), vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn missing_web_pages_is_empty() {
        let v: SearchResponse = serde_json::from_str(r#"{"_type":"SearchResponse"}"#).expect("decode");
        assert!(result_urls(v).is_empty());
    }

    #[test]
    fn rejects_empty_key() {
        assert!(BingSearch::new("  ").is_err());
        assert!(BingSearch::with_endpoint("ftp://x", "k").is_err());
    }
}
