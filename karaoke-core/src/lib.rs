pub mod candidates;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod kv;
pub mod offset;
pub mod paths;
pub mod preferences;
pub mod provider;
pub mod session;
pub mod sync;
pub mod timeline;
pub mod track;
pub mod transport;

pub use candidates::{CandidateList, CandidateSource, PreferredCandidates, VideoSearch};
pub use config::{
    KaraokeConfig, LoggingConfig, LyricsConfig, LyricsProviderType, StorageConfig, SyncConfig,
    VideoConfig, CONFIG_TEMPLATE,
};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use error::{CoreError, ErrorKind, Result};
pub use fetcher::{FetchedLyrics, LyricsFetcher};
pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use offset::OffsetStore;
pub use paths::{
    config_dir, config_path, log_file_path, store_db_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
    LOG_FILE_NAME, STORE_DB_FILE_NAME,
};
pub use preferences::{DislikedVideo, VideoPreferences};
pub use provider::LyricsProvider;
pub use session::{
    PlaybackSession, SessionCommand, SessionEvent, SessionHandle, SessionPhase, SessionServices,
    SessionSettings,
};
pub use sync::ActiveLineTracker;
pub use timeline::{LrcMetadata, LyricLine, LyricTimeline};
pub use track::Track;
pub use transport::{
    MediaPlayer, PlayerFactory, PlayerSignal, SignalSender, TaggedSignal, TransportController,
    TransportEvent, TransportState,
};
