//! Video candidates for a track: the cursor the session advances and the
//! preference-aware source that produces fresh lists.

use crate::error::{CoreError, Result};
use crate::preferences::VideoPreferences;
use crate::track::Track;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

const LOG_TARGET: &str = "karaoke::candidates";

/// Default text appended to "<title> <artist>" when searching for videos.
pub const DEFAULT_QUERY_SUFFIX: &str = "karaoke instrumental";

/// Ordered video identifiers with a cursor on the one being played.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    ids: Vec<String>,
    cursor: usize,
}

impl CandidateList {
    /// Repeated identifiers keep only their first position.
    #[must_use]
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids: unique(ids),
            cursor: 0,
        }
    }

    /// Identifier under the cursor, `None` once the list is exhausted.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.ids.get(self.cursor).map(String::as_str)
    }

    /// Move to the next candidate and return it.
    pub fn advance(&mut self) -> Option<&str> {
        if self.cursor < self.ids.len() {
            self.cursor += 1;
        }
        self.current()
    }

    /// Swap in a fresh list and rewind the cursor.
    pub fn replace(&mut self, ids: Vec<String>) {
        self.ids = unique(ids);
        self.cursor = 0;
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.ids.len()
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn unique(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Source of playable candidates as consumed by a playback session.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Ordered candidate identifiers for `track`.
    ///
    /// Fails with [`CoreError::NoCandidates`] when nothing remains, and with
    /// [`CoreError::ApiKeyMissing`] / [`CoreError::QuotaExceeded`] for
    /// provider configuration problems.
    async fn fetch_candidates(&self, track: &Track) -> Result<Vec<String>>;
}

/// Raw video search against an external provider.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Video identifiers matching `query`, best match first.
    async fn search_videos(&self, query: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<T: VideoSearch + ?Sized> VideoSearch for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn search_videos(&self, query: &str) -> Result<Vec<String>> {
        (**self).search_videos(query).await
    }
}

/// [`CandidateSource`] that honours the user's liked and disliked videos.
///
/// Liked videos short-circuit the search entirely; otherwise search results
/// are filtered against the disliked set.
pub struct PreferredCandidates<S> {
    search: S,
    preferences: VideoPreferences,
    query_suffix: String,
}

impl<S: VideoSearch> PreferredCandidates<S> {
    pub fn new(search: S, preferences: VideoPreferences) -> Self {
        Self {
            search,
            preferences,
            query_suffix: DEFAULT_QUERY_SUFFIX.to_string(),
        }
    }

    /// Set the text appended to the search query
    #[must_use]
    pub fn with_query_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.query_suffix = suffix.into();
        self
    }

    fn query(&self, track: &Track) -> String {
        let query = format!("{} {}", track.title, track.artist);
        if self.query_suffix.trim().is_empty() {
            query
        } else {
            format!("{query} {}", self.query_suffix.trim())
        }
    }
}

#[async_trait]
impl<S: VideoSearch> CandidateSource for PreferredCandidates<S> {
    async fn fetch_candidates(&self, track: &Track) -> Result<Vec<String>> {
        let liked = self.preferences.liked(&track.id);
        if !liked.is_empty() {
            info!(
                target: LOG_TARGET,
                "Using liked videos for {}: {}",
                track.label(),
                liked.join(", ")
            );
            return Ok(liked);
        }

        let query = self.query(track);
        info!(target: LOG_TARGET, "Searching {} for: {}", self.search.name(), query);

        let disliked = self.preferences.disliked(&track.id);
        let ids: Vec<String> = self
            .search
            .search_videos(&query)
            .await?
            .into_iter()
            .filter(|id| !id.is_empty() && !disliked.contains(id))
            .collect();

        if ids.is_empty() {
            return Err(CoreError::NoCandidates {
                track_id: track.id.clone(),
            });
        }

        info!(target: LOG_TARGET, "Found {} candidate video(s): {}", ids.len(), ids.join(", "));
        Ok(ids)
    }
}
