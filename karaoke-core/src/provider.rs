use crate::error::CoreError;
use crate::track::Track;
use async_trait::async_trait;

/// Trait for synchronized lyrics providers
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Fetch raw synchronized lyrics text (LRC) for a track.
    ///
    /// Providers fall back to looser queries on their own before giving up
    /// with [`CoreError::LyricsNotFound`].
    async fn fetch_lyrics(&self, track: &Track) -> Result<String, CoreError>;
}
