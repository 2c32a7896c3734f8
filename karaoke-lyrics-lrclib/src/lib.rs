use async_trait::async_trait;
use karaoke_core::{CoreError, LyricsProvider, Track};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const LRCLIB_API_URL: &str = "https://lrclib.net/api";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

/// LRCLIB.net lyrics provider
pub struct LrclibProvider {
    client: ClientWithMiddleware,
    base_url: String,
}

impl LrclibProvider {
    /// Create a new LRCLIB provider with default 10-second timeout and 3 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("karaoke/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: LRCLIB_API_URL.to_string(),
        })
    }

    /// Point the provider at another LRCLIB-compatible server
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn get_url(&self, track: &Track) -> String {
        format!(
            "{}/get?artist_name={}&track_name={}&duration={}",
            self.base_url,
            urlencoding::encode(&track.artist),
            urlencoding::encode(&track.title),
            track.duration_secs
        )
    }

    fn search_url(&self, track: &Track) -> String {
        let query = format!("{} {}", track.title, track.artist);
        format!("{}/search?q={}", self.base_url, urlencoding::encode(&query))
    }

    /// Exact lookup by artist, title and duration.
    async fn get_exact(&self, track: &Track) -> Result<Option<String>, CoreError> {
        let url = self.get_url(track);
        info!("LRCLIB GET (exact match): {}", url);

        let response = self.client.get(&url).send().await?;
        info!("LRCLIB response status: {}", response.status());

        if !response.status().is_success() {
            return Ok(None);
        }

        let result: LrclibResponse = response.json().await?;
        Ok(result.into_synced())
    }

    /// Free-text search; only the top hit is considered.
    async fn search(&self, track: &Track) -> Result<Option<String>, CoreError> {
        let url = self.search_url(track);
        info!("LRCLIB GET (search): {}", url);

        let response = self.client.get(&url).send().await?;
        info!("LRCLIB response status: {}", response.status());

        if !response.status().is_success() {
            return Err(CoreError::LyricsProviderFailed {
                provider: "lrclib".to_string(),
                reason: format!("LRCLIB search returned status: {}", response.status()),
            });
        }

        let results: Vec<LrclibResponse> = response.json().await?;
        Ok(top_synced(results))
    }
}

/// Response from LRCLIB API. Unused fields are ignored.
#[derive(Debug, Deserialize)]
struct LrclibResponse {
    id: i64,
    #[serde(default)]
    instrumental: bool,
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
}

impl LrclibResponse {
    fn into_synced(self) -> Option<String> {
        if self.instrumental {
            debug!("Track is instrumental (lrclib id: {})", self.id);
            return None;
        }
        self.synced_lyrics.filter(|lyrics| !lyrics.trim().is_empty())
    }
}

fn top_synced(results: Vec<LrclibResponse>) -> Option<String> {
    results.into_iter().next().and_then(LrclibResponse::into_synced)
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn name(&self) -> &'static str {
        "lrclib"
    }

    async fn fetch_lyrics(&self, track: &Track) -> Result<String, CoreError> {
        info!(
            "Fetching lyrics from LRCLIB for: {} (duration: {}s)",
            track.label(),
            track.duration_secs
        );

        match self.get_exact(track).await {
            Ok(Some(lyrics)) => return Ok(lyrics),
            Ok(None) => info!("LRCLIB exact match has no synced lyrics, trying search"),
            Err(e) => warn!("LRCLIB exact match failed ({}), trying search", e),
        }

        self.search(track).await?.ok_or_else(|| CoreError::LyricsNotFound {
            track: track.title.clone(),
            artist: track.artist.clone(),
        })
    }
}
