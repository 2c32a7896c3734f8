mod display;
mod input;
mod player;

use crate::input::Input;
use crate::player::SimulatedPlayerFactory;
use clap::{Parser, Subcommand};
use karaoke_core::config::LyricsProviderType;
use karaoke_core::{
    CandidateSource, CoreError, KaraokeConfig, KeyValueStore, LyricTimeline, LyricsFetcher,
    LyricsProvider, OffsetStore, PlaybackSession, PreferredCandidates, SessionServices,
    SessionSettings, SqliteStore, Track, VideoPreferences,
};
use karaoke_lyrics_lrclib::LrclibProvider;
use karaoke_youtube::YoutubeSearch;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_TARGET: &str = "karaoke::cli";

#[derive(Parser, Debug)]
#[clap(name = "karaoke")]
#[clap(about = "Sing along with synchronized lyrics")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a track with synchronized lyrics
    Play(PlayArgs),
    /// List every disliked video
    Dislikes,
    /// Remove a video from a track's dislikes
    Undislike { track_id: String, video_id: String },
    /// Show or set the saved sync offset of a track
    Offset {
        track_id: String,
        #[clap(allow_negative_numbers = true)]
        value: Option<f64>,
    },
}

#[derive(clap::Args, Debug)]
struct PlayArgs {
    #[clap(long)]
    track_id: String,
    #[clap(long)]
    title: String,
    #[clap(long)]
    artist: String,
    /// Track length in seconds
    #[clap(long, default_value = "0")]
    duration: u32,
    /// Read lyrics from a local LRC file instead of the lyrics providers
    #[clap(long, value_name = "FILE")]
    lrc: Option<PathBuf>,
    /// Video ids to try before searching
    #[clap(long = "video", value_name = "ID")]
    videos: Vec<String>,
    /// Video ids the simulated player refuses to play
    #[clap(long = "unplayable", value_name = "ID")]
    unplayable: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    init_tracing(check_file_logging_enabled());

    let config = match KaraokeConfig::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            println!(
                "Created a config template at {}. Review it and run again.",
                path.display()
            );
            std::process::exit(0);
        }
        Err(e) => {
            error!(target: LOG_TARGET, "{e}");
            std::process::exit(1);
        }
    };

    let store = match SqliteStore::open(&config.storage.database_path()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(target: LOG_TARGET, "Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };
    let kv: Arc<dyn KeyValueStore> = store.clone();
    let offsets = OffsetStore::with_namespace(kv.clone(), &config.storage.offset_namespace);
    let preferences = VideoPreferences::with_key(kv, &config.storage.preferences_key);

    let outcome = match cli.command {
        Command::Play(args) => run_play(&config, args, offsets, preferences),
        Command::Dislikes => {
            list_dislikes(&preferences);
            Ok(())
        }
        Command::Undislike { track_id, video_id } => {
            preferences.unmark_disliked(&track_id, &video_id)
        }
        Command::Offset { track_id, value } => show_or_set_offset(&offsets, &track_id, value),
    };

    if let Err(e) = store.checkpoint() {
        warn!(target: LOG_TARGET, "Failed to checkpoint storage: {}", e);
    }

    if let Err(e) = outcome {
        error!(target: LOG_TARGET, "{e}");
        std::process::exit(1);
    }
}

fn list_dislikes(preferences: &VideoPreferences) {
    let disliked = preferences.all_disliked();
    if disliked.is_empty() {
        println!("No disliked videos");
        return;
    }
    for entry in disliked {
        println!("{}\t{}", entry.track_id, entry.video_id);
    }
}

fn show_or_set_offset(
    offsets: &OffsetStore,
    track_id: &str,
    value: Option<f64>,
) -> Result<(), CoreError> {
    if let Some(value) = value {
        offsets.set(track_id, value)?;
    }
    println!("{track_id}: {:+.1}s", offsets.get(track_id));
    Ok(())
}

fn run_play(
    config: &KaraokeConfig,
    args: PlayArgs,
    offsets: OffsetStore,
    preferences: VideoPreferences,
) -> Result<(), CoreError> {
    let runtime = tokio::runtime::Runtime::new()?;

    let cancel_token = CancellationToken::new();
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!(target: LOG_TARGET, "Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!(target: LOG_TARGET, "Failed to set Ctrl+C handler: {}", e);
    }

    runtime.block_on(play(config, args, offsets, preferences, cancel_token))
}

async fn play(
    config: &KaraokeConfig,
    args: PlayArgs,
    offsets: OffsetStore,
    preferences: VideoPreferences,
    cancel_token: CancellationToken,
) -> Result<(), CoreError> {
    let track = Track::new(args.track_id, args.title, args.artist, args.duration);
    println!("{}", track.label());

    let search = YoutubeSearch::from_config(&config.video)?;
    let candidates: Arc<dyn CandidateSource> = Arc::new(
        PreferredCandidates::new(search, preferences.clone())
            .with_query_suffix(&config.video.query_suffix),
    );

    let (timeline, initial_ids) = tokio::join!(
        load_timeline(config, &track, args.lrc.as_deref()),
        initial_candidates(candidates.as_ref(), &track, args.videos),
    );
    let timeline = timeline?;
    info!(target: LOG_TARGET, "Loaded {} lyric line(s)", timeline.len());

    let duration_secs = if track.duration_secs == 0 {
        f64::INFINITY
    } else {
        f64::from(track.duration_secs)
    };
    let services = SessionServices {
        offsets,
        preferences,
        players: Arc::new(SimulatedPlayerFactory::new(args.unplayable, duration_secs)),
        candidates,
    };

    let (session, handle) = PlaybackSession::new(
        track,
        timeline.clone(),
        initial_ids,
        services,
        SessionSettings::from(&config.sync),
        Some(cancel_token.clone()),
    );

    let display = tokio::spawn(display::render_events(timeline, session.subscribe()));
    let mut session_task = tokio::spawn(session.run());

    println!("{}", input::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let finished = loop {
        tokio::select! {
            result = &mut session_task => {
                if let Err(e) = result {
                    warn!(target: LOG_TARGET, "Session task ended abnormally: {}", e);
                }
                break true;
            }
            () = cancel_token.cancelled() => break false,
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break false };
                match input::parse(&line, config.sync.nudge_step) {
                    Input::Command(command) => {
                        if handle.send(command).is_err() {
                            break false;
                        }
                    }
                    Input::Help => println!("{}", input::HELP),
                    Input::Quit => break false,
                    Input::Invalid(text) => println!("unknown command: {text} (h for help)"),
                }
            }
        }
    };

    if !finished {
        let _ = handle.shutdown();
        if let Err(e) = session_task.await {
            warn!(target: LOG_TARGET, "Session task ended abnormally: {}", e);
        }
    }
    let _ = display.await;
    Ok(())
}

async fn load_timeline(
    config: &KaraokeConfig,
    track: &Track,
    lrc: Option<&Path>,
) -> Result<LyricTimeline, CoreError> {
    match lrc {
        Some(path) => Ok(LyricTimeline::parse(&tokio::fs::read_to_string(path).await?)),
        None => Ok(LyricsFetcher::new(create_providers(config))
            .fetch_timeline(track)
            .await),
    }
}

/// Explicit ids win; otherwise search up front. A failed search leaves the
/// list empty and the session asks again, surfacing the error itself.
async fn initial_candidates(
    source: &dyn CandidateSource,
    track: &Track,
    explicit: Vec<String>,
) -> Vec<String> {
    if !explicit.is_empty() {
        return explicit;
    }
    match source.fetch_candidates(track).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(target: LOG_TARGET, "Initial candidate search failed: {}", e);
            Vec::new()
        }
    }
}

fn create_providers(config: &KaraokeConfig) -> Vec<Box<dyn LyricsProvider>> {
    config
        .lyrics
        .providers
        .iter()
        .filter_map(|provider_type| -> Option<Box<dyn LyricsProvider>> {
            match provider_type {
                LyricsProviderType::Lrclib => {
                    info!(target: LOG_TARGET, "Initializing LRCLIB provider");
                    match LrclibProvider::new() {
                        Ok(provider) => Some(Box::new(provider)),
                        Err(e) => {
                            error!(target: LOG_TARGET, "Failed to create LRCLIB provider: {}", e);
                            None
                        }
                    }
                }
            }
        })
        .collect()
}

/// Check if file logging is enabled by reading the config file.
/// This is done before full config loading to set up tracing first.
/// Returns `false` if config doesn't exist or can't be parsed.
fn check_file_logging_enabled() -> bool {
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(KaraokeConfig::config_path()) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing on stderr, plus a log file when enabled
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest_retry=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = karaoke_core::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
