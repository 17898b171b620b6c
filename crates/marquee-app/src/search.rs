//! Jackett-compatible indexer aggregator client.
//!
//! # Design
//! - One search endpoint across all configured indexers; the category filter
//!   is omitted when set to `All`.
//! - Candidates carry the magnet URI and download link as their payload so a
//!   selection can be resolved later without another search.
//! - Download links are followed at most once, without redirects, so a magnet
//!   `Location` header can be captured.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use marquee_config::SearchSettings;
use marquee_core::{Candidate, ContentLocator, SearchProvider};
use reqwest::header::LOCATION;
use reqwest::{Client, redirect};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{AppError, AppResult};

const RESULTS_PATH: &str = "/api/v2.0/indexers/all/results";
const ALL_CATEGORIES: &str = "All";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Results", default)]
    results: Vec<IndexerResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IndexerResult {
    title: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    seeders: Option<u32>,
    #[serde(default)]
    tracker: Option<String>,
    #[serde(default)]
    magnet_uri: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

impl IndexerResult {
    fn into_candidate(self) -> Candidate {
        Candidate {
            size: human_size(self.size.unwrap_or(0)),
            seeds: self.seeders.unwrap_or(0),
            source: self.tracker.unwrap_or_else(|| "unknown".to_string()),
            payload: json!({ "magnet": self.magnet_uri, "link": self.link }),
            title: self.title,
        }
    }
}

/// Search provider backed by a Jackett-compatible JSON API.
#[derive(Debug, Clone)]
pub struct JackettProvider {
    http: Client,
    no_redirect: Client,
    api_url: String,
    api_key: Option<String>,
}

impl JackettProvider {
    /// Build a provider for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be constructed.
    pub fn new(settings: &SearchSettings) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| AppError::Http {
                operation: "search_client",
                source,
            })?;
        let no_redirect = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|source| AppError::Http {
                operation: "resolve_client",
                source,
            })?;
        Ok(Self {
            http,
            no_redirect,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }

    async fn follow_link(&self, link: &str) -> anyhow::Result<ContentLocator> {
        let response = self
            .no_redirect
            .get(link)
            .send()
            .await
            .context("failed to request download link")?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| value.to_ascii_lowercase().starts_with("magnet:?"));
        let resolved = location.unwrap_or(link);
        ContentLocator::from_resolved(resolved).context("download link is not a usable locator")
    }
}

#[async_trait]
impl SearchProvider for JackettProvider {
    async fn search(
        &self,
        query: &str,
        category: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Candidate>> {
        let mut params = vec![("Query", query.to_string())];
        if let Some(key) = &self.api_key {
            params.push(("apikey", key.clone()));
        }
        if !category.eq_ignore_ascii_case(ALL_CATEGORIES) {
            params.push(("Category[]", category.to_string()));
        }

        let response = self
            .http
            .get(format!("{}{RESULTS_PATH}", self.api_url))
            .query(&params)
            .send()
            .await
            .context("search request failed")?
            .error_for_status()
            .context("search request rejected")?;
        let body: SearchResponse = response
            .json()
            .await
            .context("search response was not valid JSON")?;

        debug!(query, results = body.results.len(), "indexer search completed");
        Ok(body
            .results
            .into_iter()
            .take(limit)
            .map(IndexerResult::into_candidate)
            .collect())
    }

    async fn resolve_locator(
        &self,
        candidate: &Candidate,
    ) -> anyhow::Result<Option<ContentLocator>> {
        if let Some(magnet) = payload_str(&candidate.payload, "magnet") {
            return ContentLocator::from_resolved(magnet)
                .map(Some)
                .context("magnet payload is not a usable locator");
        }
        match payload_str(&candidate.payload, "link") {
            Some(link) => self.follow_link(link).await.map(Some),
            None => Ok(None),
        }
    }
}

fn payload_str<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

/// Format a byte count with binary multiples, e.g. `1.40 GB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < SIZE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", SIZE_UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn provider(server: &MockServer, api_key: Option<&str>) -> JackettProvider {
        let settings = SearchSettings {
            api_url: server.base_url(),
            api_key: api_key.map(str::to_string),
            category: "All".into(),
            limit: 20,
        };
        JackettProvider::new(&settings).expect("provider")
    }

    #[test]
    fn sizes_render_in_binary_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[tokio::test]
    async fn search_maps_results_and_applies_limit() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(RESULTS_PATH)
                .query_param("Query", "Interstellar")
                .query_param("apikey", "secret")
                .query_param_missing("Category[]");
            then.status(200).json_body(json!({
                "Results": [
                    {"Title": "Interstellar 1080p", "Size": 2_147_483_648_u64, "Seeders": 12,
                     "Tracker": "alpha", "MagnetUri": "magnet:?xt=urn:btih:aa", "Link": null},
                    {"Title": "Interstellar 720p", "Size": 1024, "Seeders": 3, "Tracker": "beta"},
                    {"Title": "Interstellar CAM", "Size": 10, "Seeders": 0}
                ]
            }));
        });

        let candidates = provider(&server, Some("secret"))
            .search("Interstellar", "All", 2)
            .await?;

        mock.assert();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Interstellar 1080p");
        assert_eq!(candidates[0].size, "2.00 GB");
        assert_eq!(candidates[0].seeds, 12);
        assert_eq!(candidates[0].source, "alpha");
        assert_eq!(candidates[0].payload["magnet"], "magnet:?xt=urn:btih:aa");
        assert_eq!(candidates[1].payload["magnet"], Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn search_sends_specific_category() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(RESULTS_PATH)
                .query_param("Category[]", "2000");
            then.status(200).json_body(json!({ "Results": [] }));
        });

        let candidates = provider(&server, None).search("Arrival", "2000", 20).await?;
        mock.assert();
        assert!(candidates.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn search_errors_surface_on_server_failure() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(RESULTS_PATH);
            then.status(503);
        });

        let result = provider(&server, None).search("x", "All", 20).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn resolve_prefers_magnet_payload() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let candidate = Candidate {
            title: "t".into(),
            size: "1 B".into(),
            seeds: 1,
            source: "s".into(),
            payload: json!({"magnet": "magnet:?xt=urn:btih:bb", "link": server.url("/dl")}),
        };
        let locator = provider(&server, None).resolve_locator(&candidate).await?;
        assert_eq!(
            locator,
            Some(ContentLocator::Magnet("magnet:?xt=urn:btih:bb".into()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn resolve_captures_magnet_redirect_once() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/dl/1");
            then.status(302)
                .header("Location", "magnet:?xt=urn:btih:cc");
        });
        let candidate = Candidate {
            title: "t".into(),
            size: "1 B".into(),
            seeds: 1,
            source: "s".into(),
            payload: json!({"magnet": null, "link": server.url("/dl/1")}),
        };

        let locator = provider(&server, None).resolve_locator(&candidate).await?;
        mock.assert_calls(1);
        assert_eq!(
            locator,
            Some(ContentLocator::Magnet("magnet:?xt=urn:btih:cc".into()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn resolve_falls_back_to_link_and_none() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/dl/2");
            then.status(200).body("d8:announce...");
        });
        let provider = provider(&server, None);
        let link = server.url("/dl/2");
        let with_link = Candidate {
            title: "t".into(),
            size: "1 B".into(),
            seeds: 1,
            source: "s".into(),
            payload: json!({"link": link}),
        };
        assert_eq!(
            provider.resolve_locator(&with_link).await?,
            Some(ContentLocator::Url(link))
        );

        let bare = Candidate {
            payload: json!({}),
            ..with_link
        };
        assert_eq!(provider.resolve_locator(&bare).await?, None);
        Ok(())
    }
}
