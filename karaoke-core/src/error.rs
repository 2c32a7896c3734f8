use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please review it and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Lookup errors
    #[error("Lyrics not found for track: {track} by {artist}")]
    LyricsNotFound { track: String, artist: String },

    #[error("No video candidates remain for track {track_id}")]
    NoCandidates { track_id: String },

    #[error("Lyrics provider {provider} failed: {reason}")]
    LyricsProviderFailed { provider: String, reason: String },

    #[error("Video search {provider} failed: {reason}")]
    VideoSearchFailed { provider: String, reason: String },

    // Provider configuration errors
    #[error("{service} API key not configured")]
    ApiKeyMissing { service: String },

    #[error("{service} API quota exceeded or key is invalid")]
    QuotaExceeded { service: String },

    // Playback errors
    #[error("Media {media_id} failed to play (player error code {code})")]
    PlaybackFailed { media_id: String, code: i32 },

    #[error("No playable media for track {track_id}")]
    NoPlayableMedia { track_id: String },

    #[error("Player could not be created for {media_id}: {reason}")]
    PlayerUnavailable { media_id: String, reason: String },

    #[error("Offset must be a finite number of seconds, got {value}")]
    InvalidOffset { value: f64 },

    #[error("Playback session is closed")]
    SessionClosed,

    // Storage errors
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // Network errors
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Network request failed: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

/// Coarse classification used by the orchestration layer to decide between
/// fallback, local recovery and user-visible termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Metadata, lyrics or candidates absent. Recoverable.
    NotFound,
    /// Provider is not configured. Surfaced verbatim, never retried.
    ApiKeyMissing,
    /// Provider-side rate limiting. Surfaced verbatim, never retried.
    QuotaExceeded,
    /// The current media candidate is unusable.
    Playback,
    /// Anything else.
    Unexpected,
}

impl CoreError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::LyricsNotFound { .. } | Self::NoCandidates { .. } => ErrorKind::NotFound,
            Self::ApiKeyMissing { .. } => ErrorKind::ApiKeyMissing,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::PlaybackFailed { .. }
            | Self::NoPlayableMedia { .. }
            | Self::PlayerUnavailable { .. } => ErrorKind::Playback,
            _ => ErrorKind::Unexpected,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_not_found() {
        let err = CoreError::NoCandidates {
            track_id: "42".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_kind_provider_configuration() {
        let missing = CoreError::ApiKeyMissing {
            service: "YouTube".into(),
        };
        let quota = CoreError::QuotaExceeded {
            service: "YouTube".into(),
        };
        assert_eq!(missing.kind(), ErrorKind::ApiKeyMissing);
        assert_eq!(quota.kind(), ErrorKind::QuotaExceeded);
        assert_eq!(missing.to_string(), "YouTube API key not configured");
    }

    #[test]
    fn test_kind_unexpected() {
        let err = CoreError::Unexpected {
            message: "boom".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(!err.is_not_found());
    }
}
