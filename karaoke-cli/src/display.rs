//! Terminal rendering of session events.

use karaoke_core::{LyricTimeline, SessionEvent};
use std::fmt::Write;
use tokio::sync::broadcast;
use tracing::info;

const LOG_TARGET: &str = "karaoke::display";

/// Lines shown before and after the active one
const CONTEXT_LINES: usize = 2;

/// Lyric lines around `active`, numbered from 1, the active one marked.
pub fn render_window(timeline: &LyricTimeline, active: Option<usize>) -> String {
    let window = timeline.window(active, CONTEXT_LINES, CONTEXT_LINES);
    let Some(first) = window.first() else {
        return "  (no synced lyrics)\n".to_string();
    };
    let start = timeline
        .lines()
        .iter()
        .position(|line| line.id == first.id)
        .unwrap_or_default();

    let mut out = String::new();
    for (offset, line) in window.iter().enumerate() {
        let index = start + offset;
        let marker = if Some(index) == active { '>' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker} {:>3} [{:>6.2}] {}",
            index + 1,
            line.time,
            line.text
        );
    }
    out
}

/// Print session events until the session closes.
pub async fn render_events(timeline: LyricTimeline, mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event {
                SessionEvent::ScrollToLine { index, .. } => {
                    println!("\n{}", render_window(&timeline, Some(index)));
                }
                SessionEvent::ActiveLineChanged { index: None } => {
                    println!("\n{}", render_window(&timeline, None));
                }
                SessionEvent::ActiveLineChanged { .. } => {}
                SessionEvent::OffsetChanged { offset } => {
                    println!("offset: {offset:+.1}s");
                }
                SessionEvent::PlayStateChanged { is_playing } => {
                    println!("{}", if is_playing { "playing" } else { "paused" });
                }
                SessionEvent::CandidateChanged { video_id, liked } => {
                    let heart = if liked { " (liked)" } else { "" };
                    println!("video: {video_id}{heart}");
                }
                SessionEvent::LikeToggled { video_id, liked } => {
                    println!("{} {video_id}", if liked { "liked" } else { "disliked" });
                }
                SessionEvent::SessionReady { video_id } => {
                    info!(target: LOG_TARGET, "Player ready: {}", video_id);
                }
                SessionEvent::PlayerVisibilityChanged { visible } => {
                    println!("player {}", if visible { "visible" } else { "hidden" });
                }
                SessionEvent::SessionFailed { message, .. } => {
                    println!("error: {message}");
                }
                SessionEvent::SessionClosed => break,
            },
            Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                info!(target: LOG_TARGET, "Missed {} session events", n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> LyricTimeline {
        LyricTimeline::parse(
            "[00:01.00]one\n[00:02.00]two\n[00:03.00]three\n[00:04.00]four\n[00:05.00]five\n[00:06.00]six",
        )
    }

    #[test]
    fn test_window_marks_active_line() {
        let out = render_window(&timeline(), Some(3));
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "    2 [  2.00] two");
        assert_eq!(lines[2], ">   4 [  4.00] four");
        assert_eq!(lines[4], "    6 [  6.00] six");
    }

    #[test]
    fn test_empty_timeline() {
        let out = render_window(&LyricTimeline::empty(), None);
        assert_eq!(out, "  (no synced lyrics)\n");
    }
}
