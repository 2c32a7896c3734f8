//! Video search backed by the YouTube Data API v3.

use async_trait::async_trait;
use karaoke_core::{CoreError, VideoConfig, VideoSearch};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Service name reported in configuration errors
pub const SERVICE_NAME: &str = "YouTube";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

pub struct YoutubeSearch {
    client: ClientWithMiddleware,
    api_key: Option<String>,
    max_results: u32,
    base_url: String,
}

impl YoutubeSearch {
    /// Create a search client. A missing key is only reported when a search runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: Option<String>, max_results: u32) -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        // 403 is not transient, so quota errors surface on the first attempt
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            max_results,
            base_url: YOUTUBE_API_URL.to_string(),
        })
    }

    /// Build from the `[video]` config section
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &VideoConfig) -> Result<Self, CoreError> {
        Self::new(config.resolved_api_key(), config.max_results)
    }

    /// Point the client at another server
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn search_url(&self, api_key: &str, query: &str) -> String {
        format!(
            "{}/search?part=snippet&type=video&maxResults={}&q={}&key={}",
            self.base_url,
            self.max_results,
            urlencoding::encode(query),
            urlencoding::encode(api_key)
        )
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
}

#[derive(Debug, Deserialize)]
struct ItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl SearchResponse {
    fn video_ids(self) -> Vec<String> {
        self.items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .filter(|id| !id.is_empty())
            .collect()
    }
}

/// API error message from a failed response body, if it has one.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|response| response.error.message)
}

#[async_trait]
impl VideoSearch for YoutubeSearch {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn search_videos(&self, query: &str) -> Result<Vec<String>, CoreError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CoreError::ApiKeyMissing {
                service: SERVICE_NAME.to_string(),
            });
        };

        info!("YouTube search: {}", query);
        let response = self
            .client
            .get(self.search_url(api_key, query))
            .send()
            .await?;
        let status = response.status();
        info!("YouTube response status: {}", status);

        if status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "YouTube refused the request: {}",
                error_message(&body).unwrap_or(body)
            );
            return Err(CoreError::QuotaExceeded {
                service: SERVICE_NAME.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));
            warn!("YouTube search failed: {}", reason);
            return Err(CoreError::VideoSearchFailed {
                provider: self.name().to_string(),
                reason,
            });
        }

        let results: SearchResponse = response.json().await?;
        Ok(results.video_ids())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_ids_skip_non_videos() {
        let body = r#"{
            "kind": "youtube#searchListResponse",
            "items": [
                {"kind": "youtube#searchResult", "id": {"kind": "youtube#video", "videoId": "abc123"}},
                {"kind": "youtube#searchResult", "id": {"kind": "youtube#channel", "channelId": "UCx"}},
                {"kind": "youtube#searchResult", "id": {"kind": "youtube#video", "videoId": ""}},
                {"kind": "youtube#searchResult", "id": {"kind": "youtube#video", "videoId": "def456"}}
            ]
        }"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.video_ids(), vec!["abc123".to_string(), "def456".to_string()]);
    }

    #[test]
    fn test_missing_items_is_empty() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(response.video_ids().is_empty());
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error":{"code":403,"message":"The request cannot be completed because you have exceeded your quota."}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("The request cannot be completed because you have exceeded your quota.")
        );
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn test_search_url() {
        let search = YoutubeSearch::new(Some("k&y".into()), 10)
            .unwrap()
            .with_base_url("http://localhost/yt/");
        assert_eq!(
            search.search_url("k&y", "Song Artist karaoke instrumental"),
            "http://localhost/yt/search?part=snippet&type=video&maxResults=10&q=Song%20Artist%20karaoke%20instrumental&key=k%26y"
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let search = YoutubeSearch::new(Some("   ".into()), 10)
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let err = search.search_videos("anything").await.unwrap_err();
        assert!(matches!(err, CoreError::ApiKeyMissing { ref service } if service == "YouTube"));
    }
}
