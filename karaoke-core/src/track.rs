use serde::{Deserialize, Serialize};

/// A song selected from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Stable catalog identifier; scopes the persisted offset and preferences
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub cover_art_url: Option<String>,
    /// Track length in whole seconds
    pub duration_secs: u32,
}

impl Track {
    /// Create a new track
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        duration_secs: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            cover_art_url: None,
            duration_secs,
        }
    }

    /// Set cover art URL
    #[must_use]
    pub fn with_cover_art(mut self, url: impl Into<String>) -> Self {
        self.cover_art_url = Some(url.into());
        self
    }

    /// "Title - Artist" label for logs and terminal output.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }
}
