//! Simulated media player driven by the tokio clock.
//!
//! Stands in for an embedded video player in the terminal: it reports ready
//! immediately, follows play/pause/seek, and derives its position from
//! elapsed time. Media ids listed as unplayable report an error instead.

use karaoke_core::transport::state_code;
use karaoke_core::{MediaPlayer, PlayerFactory, PlayerSignal, Result, SignalSender};
use std::collections::HashSet;
use tokio::time::Instant;
use tracing::debug;

const LOG_TARGET: &str = "karaoke::player";

/// Error code reported for media marked unplayable
const EMBED_NOT_ALLOWED: i32 = 150;

pub struct SimulatedPlayerFactory {
    unplayable: HashSet<String>,
    duration_secs: f64,
}

impl SimulatedPlayerFactory {
    pub fn new(unplayable: impl IntoIterator<Item = String>, duration_secs: f64) -> Self {
        Self {
            unplayable: unplayable.into_iter().collect(),
            duration_secs,
        }
    }
}

impl PlayerFactory for SimulatedPlayerFactory {
    fn create(&self, media_id: &str, signals: SignalSender) -> Result<Box<dyn MediaPlayer>> {
        if self.unplayable.contains(media_id) {
            debug!(target: LOG_TARGET, "Simulating unplayable media {}", media_id);
            signals.send(PlayerSignal::ErrorCode(EMBED_NOT_ALLOWED));
        } else {
            signals.send(PlayerSignal::Ready);
        }

        Ok(Box::new(SimulatedPlayer {
            signals,
            duration_secs: self.duration_secs,
            base_position: 0.0,
            started_at: None,
        }))
    }
}

struct SimulatedPlayer {
    signals: SignalSender,
    duration_secs: f64,
    /// Position at the last play/pause/seek
    base_position: f64,
    /// Set while playing
    started_at: Option<Instant>,
}

impl SimulatedPlayer {
    fn position(&self) -> f64 {
        let elapsed = self
            .started_at
            .map_or(0.0, |started| started.elapsed().as_secs_f64());
        (self.base_position + elapsed).clamp(0.0, self.duration_secs)
    }
}

impl MediaPlayer for SimulatedPlayer {
    fn play(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
            self.signals
                .send(PlayerSignal::StateCode(state_code::PLAYING));
        }
    }

    fn pause(&mut self) {
        if self.started_at.is_some() {
            self.base_position = self.position();
            self.started_at = None;
            self.signals.send(PlayerSignal::StateCode(state_code::PAUSED));
        }
    }

    fn seek_to(&mut self, seconds: f64) {
        self.base_position = seconds.clamp(0.0, self.duration_secs);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn current_time(&self) -> Option<f64> {
        Some(self.position())
    }

    fn destroy(&mut self) {
        self.started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use karaoke_core::{TaggedSignal, TransportController, TransportState};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn transport(
        unplayable: &[&str],
        duration_secs: f64,
    ) -> (TransportController, mpsc::UnboundedReceiver<TaggedSignal>) {
        let factory = SimulatedPlayerFactory::new(
            unplayable.iter().map(ToString::to_string),
            duration_secs,
        );
        TransportController::new(Arc::new(factory))
    }

    /// Feed queued signals back into the transport and return what was sent.
    fn pump(
        transport: &mut TransportController,
        rx: &mut mpsc::UnboundedReceiver<TaggedSignal>,
    ) -> Vec<PlayerSignal> {
        let mut signals = Vec::new();
        while let Ok(tagged) = rx.try_recv() {
            signals.push(tagged.signal);
            transport.handle_signal(tagged);
        }
        signals
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_play_and_seek() {
        let (mut transport, mut rx) = transport(&[], 60.0);
        transport.load("v").unwrap();
        assert_eq!(pump(&mut transport, &mut rx), vec![PlayerSignal::Ready]);

        transport.play();
        assert_eq!(
            pump(&mut transport, &mut rx),
            vec![PlayerSignal::StateCode(state_code::PLAYING)]
        );
        assert_eq!(transport.state(), TransportState::Playing);

        tokio::time::advance(Duration::from_millis(1500)).await;
        let now = transport.sample_clock().unwrap();
        assert!((now - 1.5).abs() < 1e-6);

        transport.seek(30.0);
        tokio::time::advance(Duration::from_secs(1)).await;
        let now = transport.sample_clock().unwrap();
        assert!((now - 31.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_clock() {
        let (mut transport, mut rx) = transport(&[], 60.0);
        transport.load("v").unwrap();
        pump(&mut transport, &mut rx);
        transport.play();
        pump(&mut transport, &mut rx);

        tokio::time::advance(Duration::from_secs(2)).await;
        transport.pause();
        assert_eq!(
            pump(&mut transport, &mut rx),
            vec![PlayerSignal::StateCode(state_code::PAUSED)]
        );

        let paused_at = transport.sample_clock().unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(transport.sample_clock(), Some(paused_at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_is_clamped_to_duration() {
        let (mut transport, mut rx) = transport(&[], 2.0);
        transport.load("v").unwrap();
        pump(&mut transport, &mut rx);
        transport.play();
        pump(&mut transport, &mut rx);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(transport.sample_clock(), Some(2.0));

        transport.seek(-3.0);
        assert_eq!(transport.sample_clock(), Some(0.0));
    }

    #[test]
    fn test_unplayable_reports_error() {
        let (mut transport, mut rx) = transport(&["bad"], 60.0);
        transport.load("bad").unwrap();
        assert_eq!(
            pump(&mut transport, &mut rx),
            vec![PlayerSignal::ErrorCode(EMBED_NOT_ALLOWED)]
        );
        assert_eq!(transport.state(), TransportState::Errored);
    }
}
