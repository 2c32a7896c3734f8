//! Lyrics fetcher that walks the configured providers in priority order.

use crate::provider::LyricsProvider;
use crate::timeline::LyricTimeline;
use crate::track::Track;
use tracing::{info, warn};

const LOG_TARGET: &str = "karaoke::fetcher";

/// Outcome of a lyrics lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedLyrics {
    /// Name of the provider that answered, `None` if none did
    pub provider: Option<&'static str>,
    pub timeline: LyricTimeline,
}

pub struct LyricsFetcher {
    providers: Vec<Box<dyn LyricsProvider>>,
}

impl LyricsFetcher {
    /// Create a new lyrics fetcher
    ///
    /// # Arguments
    /// * `providers` - List of lyrics providers to try in order
    #[must_use]
    pub fn new(providers: Vec<Box<dyn LyricsProvider>>) -> Self {
        Self { providers }
    }

    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch and parse lyrics for `track`.
    ///
    /// Never fails: a track nobody has timed lyrics for gets an empty
    /// timeline, the same as an instrumental.
    pub async fn fetch(&self, track: &Track) -> FetchedLyrics {
        info!(
            target: LOG_TARGET,
            "Fetching lyrics for: {} (providers: {:?})",
            track.label(),
            self.provider_names()
        );

        for provider in &self.providers {
            info!(target: LOG_TARGET, "Trying provider: {}", provider.name());
            match provider.fetch_lyrics(track).await {
                Ok(raw) => {
                    let timeline = LyricTimeline::parse(&raw);
                    if timeline.is_empty() {
                        info!(target: LOG_TARGET, "{} returned no timed lines", provider.name());
                        continue;
                    }
                    info!(
                        target: LOG_TARGET,
                        "Found synced lyrics from {} ({} lines)",
                        provider.name(),
                        timeline.len()
                    );
                    return FetchedLyrics {
                        provider: Some(provider.name()),
                        timeline,
                    };
                }
                Err(e) if e.is_not_found() => {
                    info!(
                        target: LOG_TARGET,
                        "{} has no lyrics for {}",
                        provider.name(),
                        track.label()
                    );
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, "Provider {} failed: {}", provider.name(), e);
                }
            }
        }

        info!(target: LOG_TARGET, "No synced lyrics found for {}", track.label());
        FetchedLyrics {
            provider: None,
            timeline: LyricTimeline::empty(),
        }
    }

    /// Like [`fetch`](Self::fetch) but only the timeline.
    pub async fn fetch_timeline(&self, track: &Track) -> LyricTimeline {
        self.fetch(track).await.timeline
    }
}
