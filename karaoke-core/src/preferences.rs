//! Per-track liked / disliked video preferences.

use crate::error::Result;
use crate::kv::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

const LOG_TARGET: &str = "karaoke::preferences";

/// Default key of the aggregate preferences entry.
pub const DEFAULT_PREFERENCES_KEY: &str = "video_preferences";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TrackPreferences {
    #[serde(default)]
    liked: Vec<String>,
    #[serde(default)]
    disliked: Vec<String>,
}

type PreferenceMap = BTreeMap<String, TrackPreferences>;

/// A disliked (track, video) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DislikedVideo {
    pub track_id: String,
    pub video_id: String,
}

/// Like/dislike sets keyed by track identifier.
///
/// For any track a video is in at most one of the two sets: liking clears a
/// prior dislike and vice versa.
#[derive(Clone)]
pub struct VideoPreferences {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl VideoPreferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, DEFAULT_PREFERENCES_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    fn load(&self) -> PreferenceMap {
        match self.store.get(&self.key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(target: LOG_TARGET, "Ignoring malformed video preferences: {}", e);
                PreferenceMap::new()
            }),
            Ok(None) => PreferenceMap::new(),
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to read video preferences: {}", e);
                PreferenceMap::new()
            }
        }
    }

    fn save(&self, preferences: &PreferenceMap) -> Result<()> {
        let raw = serde_json::to_string(preferences)?;
        self.store.set(&self.key, &raw)
    }

    /// Mark `video_id` as liked for `track_id`, clearing any dislike.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences cannot be persisted.
    pub fn mark_liked(&self, track_id: &str, video_id: &str) -> Result<()> {
        debug!(target: LOG_TARGET, "Liking video {} for track {}", video_id, track_id);
        let mut preferences = self.load();
        let entry = preferences.entry(track_id.to_string()).or_default();
        if !entry.liked.iter().any(|id| id == video_id) {
            entry.liked.push(video_id.to_string());
        }
        entry.disliked.retain(|id| id != video_id);
        self.save(&preferences)
    }

    /// Mark `video_id` as disliked for `track_id`, clearing any like.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences cannot be persisted.
    pub fn mark_disliked(&self, track_id: &str, video_id: &str) -> Result<()> {
        debug!(target: LOG_TARGET, "Disliking video {} for track {}", video_id, track_id);
        let mut preferences = self.load();
        let entry = preferences.entry(track_id.to_string()).or_default();
        if !entry.disliked.iter().any(|id| id == video_id) {
            entry.disliked.push(video_id.to_string());
        }
        entry.liked.retain(|id| id != video_id);
        self.save(&preferences)
    }

    /// Remove `video_id` from the disliked set of `track_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences cannot be persisted.
    pub fn unmark_disliked(&self, track_id: &str, video_id: &str) -> Result<()> {
        let mut preferences = self.load();
        let Some(entry) = preferences.get_mut(track_id) else {
            return Ok(());
        };
        entry.disliked.retain(|id| id != video_id);
        self.save(&preferences)
    }

    #[must_use]
    pub fn liked(&self, track_id: &str) -> Vec<String> {
        self.load()
            .remove(track_id)
            .map(|entry| entry.liked)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn disliked(&self, track_id: &str) -> Vec<String> {
        self.load()
            .remove(track_id)
            .map(|entry| entry.disliked)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_liked(&self, track_id: &str, video_id: &str) -> bool {
        self.liked(track_id).iter().any(|id| id == video_id)
    }

    /// Every disliked pair across all tracks.
    #[must_use]
    pub fn all_disliked(&self) -> Vec<DislikedVideo> {
        self.load()
            .into_iter()
            .flat_map(|(track_id, entry)| {
                entry.disliked.into_iter().map(move |video_id| DislikedVideo {
                    track_id: track_id.clone(),
                    video_id,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn preferences() -> (Arc<MemoryStore>, VideoPreferences) {
        let kv = Arc::new(MemoryStore::new());
        let prefs = VideoPreferences::new(kv.clone());
        (kv, prefs)
    }

    #[test]
    fn test_empty_by_default() {
        let (_, prefs) = preferences();
        assert!(prefs.liked("s").is_empty());
        assert!(prefs.disliked("s").is_empty());
        assert!(prefs.all_disliked().is_empty());
    }

    #[test]
    fn test_like_clears_dislike() {
        let (_, prefs) = preferences();
        prefs.mark_disliked("s", "v").unwrap();
        prefs.mark_liked("s", "v").unwrap();
        assert!(!prefs.disliked("s").contains(&"v".to_string()));
        assert_eq!(prefs.liked("s"), vec!["v".to_string()]);
    }

    #[test]
    fn test_dislike_clears_like() {
        let (_, prefs) = preferences();
        prefs.mark_liked("s", "v").unwrap();
        prefs.mark_disliked("s", "v").unwrap();
        assert!(!prefs.liked("s").contains(&"v".to_string()));
        assert!(!prefs.is_liked("s", "v"));
        assert_eq!(prefs.disliked("s"), vec!["v".to_string()]);
    }

    #[test]
    fn test_no_duplicates() {
        let (_, prefs) = preferences();
        prefs.mark_liked("s", "v").unwrap();
        prefs.mark_liked("s", "v").unwrap();
        assert_eq!(prefs.liked("s").len(), 1);
    }

    #[test]
    fn test_scoped_by_track() {
        let (_, prefs) = preferences();
        prefs.mark_liked("a", "v").unwrap();
        prefs.mark_disliked("b", "v").unwrap();
        assert!(prefs.is_liked("a", "v"));
        assert!(!prefs.is_liked("b", "v"));
    }

    #[test]
    fn test_all_disliked_and_unmark() {
        let (_, prefs) = preferences();
        prefs.mark_disliked("a", "v1").unwrap();
        prefs.mark_disliked("b", "v2").unwrap();
        prefs.mark_disliked("b", "v3").unwrap();

        let all = prefs.all_disliked();
        assert_eq!(all.len(), 3);
        assert!(all.contains(&DislikedVideo {
            track_id: "b".into(),
            video_id: "v2".into(),
        }));

        prefs.unmark_disliked("b", "v2").unwrap();
        prefs.unmark_disliked("missing", "v9").unwrap();
        assert_eq!(prefs.disliked("b"), vec!["v3".to_string()]);
        assert_eq!(prefs.all_disliked().len(), 2);
    }

    #[test]
    fn test_storage_layout() {
        let (kv, prefs) = preferences();
        prefs.mark_liked("7", "abc").unwrap();
        let raw = kv.get("video_preferences").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["7"]["liked"][0], "abc");
        assert_eq!(value["7"]["disliked"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn test_malformed_storage_is_empty() {
        let (kv, prefs) = preferences();
        kv.set("video_preferences", "{not json").unwrap();
        assert!(prefs.liked("s").is_empty());
        prefs.mark_liked("s", "v").unwrap();
        assert!(prefs.is_liked("s", "v"));
    }
}
