//! Playback session orchestration.
//!
//! A [`PlaybackSession`] owns every piece of mutable playback state for one
//! track: the transport, the candidate cursor, the live offset and the
//! active line. It runs as a single task; the outside world talks to it
//! through a [`SessionHandle`] and observes it through [`SessionEvent`]s.

use crate::candidates::{CandidateList, CandidateSource};
use crate::config::SyncConfig;
use crate::error::{CoreError, ErrorKind, Result};
use crate::offset::OffsetStore;
use crate::preferences::VideoPreferences;
use crate::sync::{self, ActiveLineTracker};
use crate::timeline::LyricTimeline;
use crate::track::Track;
use crate::transport::{
    PlayerFactory, TaggedSignal, TransportController, TransportEvent, TransportState,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const LOG_TARGET: &str = "karaoke::session";

/// Tunables for a playback session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Clock sampling period while playing
    pub poll_interval: Duration,
    /// Magnitude of one nudge, in seconds
    pub nudge_step: f64,
    /// Absolute offsets are clamped to `[-offset_limit, offset_limit]`
    pub offset_limit: f64,
    /// Minimum visible fraction for the player to count as on screen
    pub visibility_threshold: f64,
    /// Start playback as soon as a player reports ready
    pub autoplay: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            nudge_step: 0.1,
            offset_limit: 40.0,
            visibility_threshold: 0.1,
            autoplay: true,
        }
    }
}

impl From<&SyncConfig> for SessionSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            nudge_step: config.nudge_step,
            offset_limit: config.offset_limit,
            visibility_threshold: config.visibility_threshold,
            autoplay: config.autoplay,
        }
    }
}

/// Requests accepted by a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Play,
    Pause,
    TogglePlay,
    /// Shift the offset by the given number of seconds
    NudgeOffset(f64),
    /// Set the offset outright; clamped to the configured limit
    SetOffset(f64),
    /// Align the current clock reading with the first lyric line
    TapToSync,
    ResetOffset,
    /// Seek so that the line at this index becomes active
    SeekToLine(usize),
    LikeCurrent,
    DislikeCurrent,
    /// Fraction of the player currently inside the viewport
    PlayerViewport { intersection_ratio: f64 },
    Shutdown,
}

/// Events emitted by a playback session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A candidate's player is ready
    SessionReady { video_id: String },
    /// No playable media remains; emitted at most once per session
    SessionFailed { kind: ErrorKind, message: String },
    /// The highlighted line changed
    ActiveLineChanged { index: Option<usize> },
    /// The view should bring this line into focus
    ScrollToLine { index: usize, line_id: String },
    OffsetChanged { offset: f64 },
    PlayStateChanged { is_playing: bool },
    /// A new candidate was bound to the player
    CandidateChanged { video_id: String, liked: bool },
    LikeToggled { video_id: String, liked: bool },
    PlayerVisibilityChanged { visible: bool },
    SessionClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Running,
    Failed,
    Closed,
}

/// Collaborators a session needs besides the track itself.
#[derive(Clone)]
pub struct SessionServices {
    pub offsets: OffsetStore,
    pub preferences: VideoPreferences,
    pub players: Arc<dyn PlayerFactory>,
    pub candidates: Arc<dyn CandidateSource>,
}

/// Cloneable handle for driving a session from other tasks.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    cancel_token: CancellationToken,
}

impl SessionHandle {
    /// Queue a command for the session task.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] once the session has stopped.
    pub fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| CoreError::SessionClosed)
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Ask the session to tear down.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if it already has.
    pub fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown)
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

struct PendingReplacement {
    token: u64,
    cancel: CancellationToken,
}

struct Replacement {
    token: u64,
    result: Result<Vec<String>>,
}

pub struct PlaybackSession {
    track: Track,
    timeline: LyricTimeline,
    settings: SessionSettings,
    offsets: OffsetStore,
    preferences: VideoPreferences,
    source: Arc<dyn CandidateSource>,
    candidates: CandidateList,
    /// Candidates that errored or were disliked during this session
    rejected: HashSet<String>,
    /// Most recent player error, reported if the candidates run out
    last_playback_failure: Option<CoreError>,
    transport: TransportController,
    signal_rx: mpsc::UnboundedReceiver<TaggedSignal>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    replacement_tx: mpsc::UnboundedSender<Replacement>,
    replacement_rx: mpsc::UnboundedReceiver<Replacement>,
    pending_replacement: Option<PendingReplacement>,
    next_request: u64,
    clock_timer: Option<Interval>,
    event_tx: broadcast::Sender<SessionEvent>,
    cancel_token: CancellationToken,
    offset: f64,
    last_raw_time: f64,
    active_line: ActiveLineTracker,
    player_visible: bool,
    phase: SessionPhase,
}

impl PlaybackSession {
    /// Create a session for `track` and the handle used to drive it.
    ///
    /// An empty `initial_candidates` list makes the session ask the
    /// candidate source for a list as soon as it starts.
    pub fn new(
        track: Track,
        timeline: LyricTimeline,
        initial_candidates: Vec<String>,
        services: SessionServices,
        settings: SessionSettings,
        cancel_token: Option<CancellationToken>,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (replacement_tx, replacement_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(64);
        let (transport, signal_rx) = TransportController::new(services.players);
        let cancel_token = cancel_token.unwrap_or_default();

        let handle = SessionHandle {
            commands: command_tx,
            events: event_tx.clone(),
            cancel_token: cancel_token.clone(),
        };

        let session = Self {
            track,
            timeline,
            settings,
            offsets: services.offsets,
            preferences: services.preferences,
            source: services.candidates,
            candidates: CandidateList::new(initial_candidates),
            rejected: HashSet::new(),
            last_playback_failure: None,
            transport,
            signal_rx,
            command_rx,
            replacement_tx,
            replacement_rx,
            pending_replacement: None,
            next_request: 0,
            clock_timer: None,
            event_tx,
            cancel_token,
            offset: 0.0,
            last_raw_time: 0.0,
            active_line: ActiveLineTracker::default(),
            player_visible: true,
            phase: SessionPhase::Running,
        };

        (session, handle)
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    #[must_use]
    pub const fn track(&self) -> &Track {
        &self.track
    }

    #[must_use]
    pub const fn timeline(&self) -> &LyricTimeline {
        &self.timeline
    }

    /// Live offset in seconds
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    #[must_use]
    pub const fn active_line(&self) -> Option<usize> {
        self.active_line.current()
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub const fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    #[must_use]
    pub fn current_candidate(&self) -> Option<&str> {
        self.candidates.current()
    }

    /// Whether the clock is currently being sampled
    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.clock_timer.is_some()
    }

    #[must_use]
    pub const fn is_player_visible(&self) -> bool {
        self.player_visible
    }

    /// Run the session until it is shut down, cancelled or fails.
    pub async fn run(mut self) {
        info!(target: LOG_TARGET, "Starting playback session for {}", self.track.label());
        self.start();

        while self.phase == SessionPhase::Running {
            self.sync_clock_timer();

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: LOG_TARGET, "Playback session cancelled");
                    break;
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Shutdown) | None => {
                            info!(target: LOG_TARGET, "Playback session shutting down");
                            break;
                        }
                        Some(command) => self.handle_command(command),
                    }
                }
                Some(tagged) = self.signal_rx.recv() => {
                    self.handle_signal(tagged);
                }
                Some(replacement) = self.replacement_rx.recv() => {
                    self.handle_replacement(replacement);
                }
                () = next_tick(&mut self.clock_timer) => {
                    self.poll_clock();
                }
            }
        }

        self.close();
    }

    fn start(&mut self) {
        self.offset = self.offsets.get(&self.track.id);
        self.emit(SessionEvent::OffsetChanged {
            offset: self.offset,
        });
        self.refresh_active_line();
        self.load_current_candidate();
    }

    /// Only sample the clock while the transport reports playing.
    fn sync_clock_timer(&mut self) {
        let playing = self.transport.state() == TransportState::Playing;
        match (playing, self.clock_timer.is_some()) {
            (true, false) => {
                let mut timer = tokio::time::interval(self.settings.poll_interval);
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.clock_timer = Some(timer);
                debug!(target: LOG_TARGET, "Clock polling started");
            }
            (false, true) => {
                self.clock_timer = None;
                debug!(target: LOG_TARGET, "Clock polling stopped");
            }
            _ => {}
        }
    }

    fn poll_clock(&mut self) {
        if self.transport.state() != TransportState::Playing {
            return;
        }
        if let Some(raw) = self.transport.sample_clock() {
            self.last_raw_time = raw;
            self.refresh_active_line();
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn refresh_active_line(&mut self) {
        let display = sync::display_time(self.last_raw_time, self.offset);
        self.update_active_line(self.timeline.active_index(display));
    }

    fn update_active_line(&mut self, index: Option<usize>) {
        if !self.active_line.update(index) {
            return;
        }
        self.emit(SessionEvent::ActiveLineChanged { index });
        if let Some(index) = index {
            if let Some(line) = self.timeline.get(index) {
                self.emit(SessionEvent::ScrollToLine {
                    index,
                    line_id: line.id.clone(),
                });
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        debug!(target: LOG_TARGET, "Handling {:?}", command);
        let outcome = match command {
            SessionCommand::Play => {
                self.transport.play();
                Ok(())
            }
            SessionCommand::Pause => {
                self.transport.pause();
                Ok(())
            }
            SessionCommand::TogglePlay => {
                if self.transport.is_playing() {
                    self.transport.pause();
                } else {
                    self.transport.play();
                }
                Ok(())
            }
            SessionCommand::NudgeOffset(delta) => self.nudge_offset(delta).map(|_| ()),
            SessionCommand::SetOffset(value) => self.set_offset(value).map(|_| ()),
            SessionCommand::TapToSync => self.tap_to_sync().map(|_| ()),
            SessionCommand::ResetOffset => self.reset_offset().map(|_| ()),
            SessionCommand::SeekToLine(index) => {
                self.seek_to_line(index);
                Ok(())
            }
            SessionCommand::LikeCurrent => self.like_current(),
            SessionCommand::DislikeCurrent => self.dislike_current(),
            SessionCommand::PlayerViewport { intersection_ratio } => {
                self.report_viewport(intersection_ratio);
                Ok(())
            }
            SessionCommand::Shutdown => {
                self.close();
                Ok(())
            }
        };

        if let Err(e) = outcome {
            warn!(target: LOG_TARGET, "Session command failed: {}", e);
        }
    }

    fn handle_signal(&mut self, tagged: TaggedSignal) {
        if self.phase != SessionPhase::Running {
            return;
        }
        let Some(event) = self.transport.handle_signal(tagged) else {
            return;
        };

        match event {
            TransportEvent::Ready => {
                let video_id = self.transport.media_id().unwrap_or_default().to_string();
                info!(target: LOG_TARGET, "Player ready for {}", video_id);
                self.emit(SessionEvent::SessionReady { video_id });
                if self.settings.autoplay {
                    self.transport.play();
                }
            }
            TransportEvent::PlayStateChanged { is_playing } => {
                self.emit(SessionEvent::PlayStateChanged { is_playing });
            }
            TransportEvent::PlaybackError { media_id, code } => {
                let failure = CoreError::PlaybackFailed {
                    media_id: media_id.clone(),
                    code,
                };
                warn!(target: LOG_TARGET, "{}", failure);
                self.rejected.insert(media_id);
                self.last_playback_failure = Some(failure);
                self.skip_candidate();
            }
        }
    }

    fn skip_candidate(&mut self) {
        self.candidates.advance();
        self.load_current_candidate();
    }

    fn load_current_candidate(&mut self) {
        loop {
            let Some(video_id) = self.candidates.current().map(str::to_string) else {
                self.request_replacement();
                return;
            };
            if self.rejected.contains(&video_id) {
                debug!(target: LOG_TARGET, "Skipping rejected candidate {}", video_id);
                self.candidates.advance();
                continue;
            }

            match self.transport.load(&video_id) {
                Ok(()) => {
                    self.last_raw_time = 0.0;
                    self.refresh_active_line();
                    let liked = self.preferences.is_liked(&self.track.id, &video_id);
                    self.emit(SessionEvent::CandidateChanged { video_id, liked });
                    return;
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, "Skipping candidate {}: {}", video_id, e);
                    self.rejected.insert(video_id);
                    self.candidates.advance();
                }
            }
        }
    }

    /// Ask the candidate source for a fresh list. At most one request is in flight.
    fn request_replacement(&mut self) {
        if self.phase != SessionPhase::Running {
            return;
        }
        if self.pending_replacement.is_some() {
            debug!(target: LOG_TARGET, "Candidate request already in flight");
            return;
        }

        self.next_request += 1;
        let token = self.next_request;
        let cancel = self.cancel_token.child_token();
        let task_cancel = cancel.clone();
        let source = Arc::clone(&self.source);
        let track = self.track.clone();
        let tx = self.replacement_tx.clone();

        info!(target: LOG_TARGET, "Requesting fresh candidates for {}", self.track.label());
        tokio::spawn(async move {
            tokio::select! {
                () = task_cancel.cancelled() => {
                    debug!(target: LOG_TARGET, "Candidate request {} abandoned", token);
                }
                result = source.fetch_candidates(&track) => {
                    let _ = tx.send(Replacement { token, result });
                }
            }
        });

        self.pending_replacement = Some(PendingReplacement { token, cancel });
    }

    fn handle_replacement(&mut self, replacement: Replacement) {
        match &self.pending_replacement {
            Some(pending) if pending.token == replacement.token => {}
            _ => {
                debug!(target: LOG_TARGET, "Ignoring stale candidate list {}", replacement.token);
                return;
            }
        }
        self.pending_replacement = None;
        if self.phase != SessionPhase::Running {
            return;
        }

        let fresh = replacement.result.map(|ids| {
            ids.into_iter()
                .filter(|id| !self.rejected.contains(id))
                .collect::<Vec<_>>()
        });

        match fresh {
            Ok(ids) if !ids.is_empty() => {
                info!(target: LOG_TARGET, "Received {} fresh candidate(s)", ids.len());
                self.candidates.replace(ids);
                self.load_current_candidate();
            }
            Ok(_) => self.fail_exhausted(),
            Err(e) if e.is_not_found() => self.fail_exhausted(),
            Err(e) => self.fail(&e),
        }
    }

    /// Nothing left to try: report the last player error if there was one.
    fn fail_exhausted(&mut self) {
        let cause = self
            .last_playback_failure
            .take()
            .unwrap_or_else(|| CoreError::NoCandidates {
                track_id: self.track.id.clone(),
            });
        self.fail(&cause);
    }

    fn fail(&mut self, cause: &CoreError) {
        if self.phase != SessionPhase::Running {
            return;
        }
        self.phase = SessionPhase::Failed;

        let kind = match cause.kind() {
            kind @ (ErrorKind::ApiKeyMissing | ErrorKind::QuotaExceeded) => kind,
            _ => ErrorKind::Playback,
        };
        let failure = CoreError::NoPlayableMedia {
            track_id: self.track.id.clone(),
        };
        let message = format!("{failure}: {cause}");
        error!(target: LOG_TARGET, "{}", message);

        self.clock_timer = None;
        self.transport.unload();
        self.emit(SessionEvent::SessionFailed { kind, message });
    }

    fn close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        self.phase = SessionPhase::Closed;
        self.clock_timer = None;
        if let Some(pending) = self.pending_replacement.take() {
            pending.cancel.cancel();
        }
        self.transport.unload();
        self.emit(SessionEvent::SessionClosed);
        info!(target: LOG_TARGET, "Playback session for {} closed", self.track.label());
    }

    /// Set the live offset and persist it. The live value is applied even
    /// when persisting fails.
    fn apply_offset(&mut self, value: f64) -> Result<f64> {
        if !value.is_finite() {
            warn!(target: LOG_TARGET, "Ignoring non-finite offset {}", value);
            return Ok(self.offset);
        }

        let persisted = self.offsets.set(&self.track.id, value);
        self.offset = value;
        self.emit(SessionEvent::OffsetChanged { offset: value });
        self.refresh_active_line();
        persisted.map(|()| value)
    }

    /// Shift the offset by `delta`, rounded to one decimal place.
    ///
    /// # Errors
    ///
    /// Returns an error if the new offset cannot be persisted.
    pub fn nudge_offset(&mut self, delta: f64) -> Result<f64> {
        self.apply_offset(round_tenths(self.offset + delta))
    }

    /// Set the offset outright, clamped to the configured limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the new offset cannot be persisted.
    pub fn set_offset(&mut self, value: f64) -> Result<f64> {
        let limit = self.settings.offset_limit.abs();
        self.apply_offset(value.clamp(-limit, limit))
    }

    /// Align the current clock reading with the first line. `None` when
    /// there are no lyrics to align with.
    ///
    /// # Errors
    ///
    /// Returns an error if the new offset cannot be persisted.
    pub fn tap_to_sync(&mut self) -> Result<Option<f64>> {
        let Some(first) = self.timeline.first_time() else {
            debug!(target: LOG_TARGET, "Tap-to-sync ignored without lyrics");
            return Ok(None);
        };
        let raw = self.transport.sample_clock().unwrap_or(self.last_raw_time);
        self.last_raw_time = raw;
        self.apply_offset(OffsetStore::tap_to_sync(raw, first)).map(Some)
    }

    /// # Errors
    ///
    /// Returns an error if the reset cannot be persisted.
    pub fn reset_offset(&mut self) -> Result<f64> {
        self.apply_offset(0.0)
    }

    /// Seek so that the line at `index` starts now. Returns whether a seek was issued.
    pub fn seek_to_line(&mut self, index: usize) -> bool {
        let Some(line_time) = self.timeline.get(index).map(|line| line.time) else {
            warn!(target: LOG_TARGET, "No lyric line at index {}", index);
            return false;
        };

        let target = sync::seek_target(line_time, self.offset);
        if !self.transport.seek(target) {
            return false;
        }
        self.last_raw_time = target;
        self.update_active_line(self.timeline.active_index(line_time));
        true
    }

    /// Remember the current candidate as liked.
    ///
    /// # Errors
    ///
    /// Returns an error if the preference cannot be persisted.
    pub fn like_current(&mut self) -> Result<()> {
        let Some(video_id) = self.candidates.current().map(str::to_string) else {
            debug!(target: LOG_TARGET, "No current candidate to like");
            return Ok(());
        };
        self.preferences.mark_liked(&self.track.id, &video_id)?;
        self.emit(SessionEvent::LikeToggled {
            video_id,
            liked: true,
        });
        Ok(())
    }

    /// Remember the current candidate as disliked and move past it.
    ///
    /// # Errors
    ///
    /// Returns an error if the preference cannot be persisted; the
    /// candidate is skipped regardless.
    pub fn dislike_current(&mut self) -> Result<()> {
        let Some(video_id) = self.candidates.current().map(str::to_string) else {
            debug!(target: LOG_TARGET, "No current candidate to dislike");
            return Ok(());
        };
        let persisted = self.preferences.mark_disliked(&self.track.id, &video_id);
        self.emit(SessionEvent::LikeToggled {
            video_id: video_id.clone(),
            liked: false,
        });
        self.rejected.insert(video_id);
        self.skip_candidate();
        persisted
    }

    /// Record how much of the player is on screen.
    pub fn report_viewport(&mut self, intersection_ratio: f64) {
        let visible =
            intersection_ratio > 0.0 && intersection_ratio >= self.settings.visibility_threshold;
        if visible != self.player_visible {
            self.player_visible = visible;
            self.emit(SessionEvent::PlayerVisibilityChanged { visible });
        }
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
