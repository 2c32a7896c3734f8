//! Adapter around the embedded media player.
//!
//! The player itself is an external collaborator reached through
//! [`PlayerFactory`] and [`MediaPlayer`]. Its notifications arrive as raw
//! [`PlayerSignal`]s on a channel and are translated into the closed
//! [`TransportEvent`] set before anything else sees them.

use crate::error::{CoreError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "karaoke::transport";

/// Numeric state codes reported by the embedded player.
pub mod state_code {
    pub const UNSTARTED: i32 = -1;
    pub const ENDED: i32 = 0;
    pub const PLAYING: i32 = 1;
    pub const PAUSED: i32 = 2;
    pub const BUFFERING: i32 = 3;
    pub const CUED: i32 = 5;
}

/// Human-readable description of an embedded player error code.
#[must_use]
pub const fn describe_error_code(code: i32) -> &'static str {
    match code {
        2 => "invalid media identifier",
        5 => "player cannot decode the media",
        100 => "media not found or removed",
        101 | 150 => "media owner does not allow embedded playback",
        _ => "unknown player error",
    }
}

/// Raw notification as reported by the embedded player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSignal {
    /// The player instance is available
    Ready,
    /// The player changed state; see [`state_code`]
    StateCode(i32),
    /// The current media failed to load or play
    ErrorCode(i32),
}

/// A [`PlayerSignal`] stamped with the generation of the player that sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedSignal {
    pub generation: u64,
    pub signal: PlayerSignal,
}

/// Sending half handed to each player instance.
#[derive(Debug, Clone)]
pub struct SignalSender {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedSignal>,
}

impl SignalSender {
    /// Deliver a signal. Returns `false` once the controller is gone.
    pub fn send(&self, signal: PlayerSignal) -> bool {
        self.tx
            .send(TaggedSignal {
                generation: self.generation,
                signal,
            })
            .is_ok()
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Typed transport events surfaced to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Ready,
    PlayStateChanged { is_playing: bool },
    PlaybackError { media_id: String, code: i32 },
}

/// Handle to one embedded player instance bound to a single media id.
pub trait MediaPlayer: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to(&mut self, seconds: f64);
    /// Current raw playback position in seconds, if the player knows it.
    fn current_time(&self) -> Option<f64>;
    /// Release the instance. Called exactly once before it is dropped.
    fn destroy(&mut self) {}
}

/// Creates player instances.
pub trait PlayerFactory: Send + Sync {
    /// Create a player for `media_id` that reports through `signals`.
    ///
    /// # Errors
    ///
    /// Returns an error if no player can be created for the media id.
    fn create(&self, media_id: &str, signals: SignalSender) -> Result<Box<dyn MediaPlayer>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Unbound,
    Loading,
    Ready,
    Playing,
    Paused,
    Errored,
}

impl TransportState {
    /// Whether the player is far enough along to be sampled and seeked.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Playing | Self::Paused)
    }
}

/// Owns at most one player instance at a time.
///
/// Every [`load`](Self::load) of a new media id tears the previous instance
/// down and bumps the generation, so signals still in flight from the old
/// instance are discarded.
pub struct TransportController {
    factory: Arc<dyn PlayerFactory>,
    player: Option<Box<dyn MediaPlayer>>,
    media_id: Option<String>,
    state: TransportState,
    generation: u64,
    signal_tx: mpsc::UnboundedSender<TaggedSignal>,
}

impl TransportController {
    /// Create an unbound controller and the receiver its players report to.
    pub fn new(factory: Arc<dyn PlayerFactory>) -> (Self, mpsc::UnboundedReceiver<TaggedSignal>) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let controller = Self {
            factory,
            player: None,
            media_id: None,
            state: TransportState::Unbound,
            generation: 0,
            signal_tx,
        };
        (controller, signal_rx)
    }

    #[must_use]
    pub const fn state(&self) -> TransportState {
        self.state
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    #[must_use]
    pub fn media_id(&self) -> Option<&str> {
        self.media_id.as_deref()
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Bind to `media_id`, replacing any previous player instance.
    ///
    /// Loading the id that is already bound is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory cannot create a player; the
    /// controller is then `Errored`.
    pub fn load(&mut self, media_id: &str) -> Result<()> {
        if self.state != TransportState::Unbound && self.media_id.as_deref() == Some(media_id) {
            debug!(target: LOG_TARGET, "Media {} already bound", media_id);
            return Ok(());
        }

        self.teardown();
        self.generation += 1;
        self.media_id = Some(media_id.to_string());
        self.state = TransportState::Loading;

        let signals = SignalSender {
            generation: self.generation,
            tx: self.signal_tx.clone(),
        };

        info!(target: LOG_TARGET, "Loading media {} (generation {})", media_id, self.generation);
        match self.factory.create(media_id, signals) {
            Ok(player) => {
                self.player = Some(player);
                Ok(())
            }
            Err(e) => {
                self.state = TransportState::Errored;
                Err(CoreError::PlayerUnavailable {
                    media_id: media_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Tear down the current player, if any, and return to `Unbound`.
    pub fn unload(&mut self) {
        self.teardown();
        self.generation += 1;
        self.media_id = None;
        self.state = TransportState::Unbound;
    }

    fn teardown(&mut self) {
        if let Some(mut player) = self.player.take() {
            debug!(target: LOG_TARGET, "Destroying player for {:?}", self.media_id);
            player.destroy();
        }
    }

    pub fn play(&mut self) {
        match (self.state, self.player.as_mut()) {
            (TransportState::Ready | TransportState::Paused, Some(player)) => player.play(),
            (TransportState::Playing, _) => debug!(target: LOG_TARGET, "Already playing"),
            (state, _) => debug!(target: LOG_TARGET, "Ignoring play while {:?}", state),
        }
    }

    pub fn pause(&mut self) {
        match (self.state, self.player.as_mut()) {
            (TransportState::Playing, Some(player)) => player.pause(),
            (state, _) => debug!(target: LOG_TARGET, "Ignoring pause while {:?}", state),
        }
    }

    /// Jump the player's clock to `seconds`. Returns whether the seek was issued.
    pub fn seek(&mut self, seconds: f64) -> bool {
        if !seconds.is_finite() {
            warn!(target: LOG_TARGET, "Ignoring seek to non-finite position {}", seconds);
            return false;
        }
        match self.player.as_mut() {
            Some(player) if self.state.is_ready() => {
                player.seek_to(seconds);
                true
            }
            _ => {
                debug!(target: LOG_TARGET, "Ignoring seek while {:?}", self.state);
                false
            }
        }
    }

    /// Current raw playback position; `None` until the player is ready.
    #[must_use]
    pub fn sample_clock(&self) -> Option<f64> {
        if !self.state.is_ready() {
            return None;
        }
        self.player
            .as_ref()
            .and_then(|player| player.current_time())
            .filter(|t| t.is_finite())
    }

    /// Translate a raw signal into a transport event, updating the state machine.
    ///
    /// Signals from previous generations and signals after an error are dropped.
    pub fn handle_signal(&mut self, tagged: TaggedSignal) -> Option<TransportEvent> {
        if tagged.generation != self.generation {
            debug!(
                target: LOG_TARGET,
                "Dropping {:?} from stale generation {} (current {})",
                tagged.signal, tagged.generation, self.generation
            );
            return None;
        }

        if matches!(self.state, TransportState::Unbound | TransportState::Errored) {
            debug!(target: LOG_TARGET, "Dropping {:?} while {:?}", tagged.signal, self.state);
            return None;
        }

        match tagged.signal {
            PlayerSignal::Ready => {
                if self.state != TransportState::Loading {
                    return None;
                }
                self.state = TransportState::Ready;
                Some(TransportEvent::Ready)
            }
            PlayerSignal::StateCode(code) => {
                if self.state == TransportState::Loading {
                    debug!(target: LOG_TARGET, "Ignoring state code {} before ready", code);
                    return None;
                }
                let was_playing = self.state == TransportState::Playing;
                let is_playing = code == state_code::PLAYING;
                self.state = if is_playing {
                    TransportState::Playing
                } else {
                    TransportState::Paused
                };
                (was_playing != is_playing).then_some(TransportEvent::PlayStateChanged { is_playing })
            }
            PlayerSignal::ErrorCode(code) => {
                self.state = TransportState::Errored;
                let media_id = self.media_id.clone().unwrap_or_default();
                warn!(
                    target: LOG_TARGET,
                    "Player error {} for {}: {}",
                    code,
                    media_id,
                    describe_error_code(code)
                );
                Some(TransportEvent::PlaybackError { media_id, code })
            }
        }
    }
}

impl Drop for TransportController {
    fn drop(&mut self) {
        self.teardown();
    }
}
