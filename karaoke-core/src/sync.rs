//! Resolution of the active lyric line for a playback instant.
//!
//! Consecutive line timestamps partition the timeline into half-open
//! intervals `[line[i].time, line[i + 1].time)`, with the last line owning
//! everything from its start onwards. Display time is always computed
//! upstream as raw clock time plus the user's sync offset.

use crate::timeline::LyricLine;

/// Display time for a raw clock reading under `offset` seconds.
#[must_use]
pub fn display_time(raw_clock_time: f64, offset: f64) -> f64 {
    raw_clock_time + offset
}

/// Raw clock position that makes `line_time` the current display time.
#[must_use]
pub fn seek_target(line_time: f64, offset: f64) -> f64 {
    line_time - offset
}

/// Index of the line whose interval contains `display_time`.
///
/// Returns `None` before the first line and for an empty timeline. The scan
/// takes the first index satisfying the interval condition, so duplicate or
/// out-of-order timestamps still resolve to a defined line. A NaN display
/// time never satisfies any interval.
#[must_use]
pub fn resolve(display_time: f64, lines: &[LyricLine]) -> Option<usize> {
    lines.iter().enumerate().position(|(i, line)| {
        display_time >= line.time
            && lines
                .get(i + 1)
                .map_or(true, |next| display_time < next.time)
    })
}

/// Remembers the last resolved index so that side effects only fire when the
/// active line actually changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveLineTracker {
    current: Option<usize>,
}

impl ActiveLineTracker {
    #[must_use]
    pub const fn current(&self) -> Option<usize> {
        self.current
    }

    /// Record a freshly resolved index. Returns `true` when it differs from
    /// the previous one.
    pub fn update(&mut self, index: Option<usize>) -> bool {
        if self.current == index {
            return false;
        }
        self.current = index;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(times: &[f64]) -> Vec<LyricLine> {
        times
            .iter()
            .enumerate()
            .map(|(i, &time)| LyricLine {
                id: format!("line-{i}"),
                time,
                text: format!("line {i}"),
            })
            .collect()
    }

    #[test]
    fn test_resolve_empty() {
        for t in [-5.0, 0.0, 1.0, 1e9, f64::INFINITY] {
            assert_eq!(resolve(t, &[]), None);
        }
    }

    #[test]
    fn test_resolve_before_first_line() {
        let timeline = lines(&[5.0, 10.0]);
        assert_eq!(resolve(0.0, &timeline), None);
        assert_eq!(resolve(4.999, &timeline), None);
        assert_eq!(resolve(-1.0, &timeline), None);
    }

    #[test]
    fn test_resolve_half_open_intervals() {
        let timeline = lines(&[5.0, 10.0, 15.0]);
        assert_eq!(resolve(5.0, &timeline), Some(0));
        assert_eq!(resolve(9.999, &timeline), Some(0));
        assert_eq!(resolve(10.0, &timeline), Some(1));
        assert_eq!(resolve(14.5, &timeline), Some(1));
        assert_eq!(resolve(15.0, &timeline), Some(2));
        assert_eq!(resolve(1000.0, &timeline), Some(2));
    }

    #[test]
    fn test_resolve_duplicate_timestamps_first_match() {
        let timeline = lines(&[1.0, 2.0, 2.0, 3.0]);
        // Index 1 has an empty interval [2.0, 2.0); index 2 owns [2.0, 3.0)
        assert_eq!(resolve(2.0, &timeline), Some(2));
        assert_eq!(resolve(2.5, &timeline), Some(2));
    }

    #[test]
    fn test_resolve_out_of_order_first_match() {
        let timeline = lines(&[10.0, 5.0, 20.0]);
        // Index 0 owns [10.0, 5.0) which is empty, index 1 owns [5.0, 20.0)
        assert_eq!(resolve(12.0, &timeline), Some(1));
        assert_eq!(resolve(7.0, &timeline), Some(1));
        assert_eq!(resolve(3.0, &timeline), None);
    }

    #[test]
    fn test_resolve_nan_is_none() {
        let timeline = lines(&[0.0, 1.0]);
        assert_eq!(resolve(f64::NAN, &timeline), None);
    }

    #[test]
    fn test_resolve_partition_property() {
        let timeline = lines(&[0.5, 1.25, 3.0, 3.0, 7.75, 12.0]);
        let mut t = -1.0;
        while t < 15.0 {
            let first = resolve(t, &timeline);
            assert_eq!(first, resolve(t, &timeline));
            if let Some(i) = first {
                assert!(timeline[i].time <= t);
                assert!(i == timeline.len() - 1 || t < timeline[i + 1].time);
            } else {
                assert!(t < timeline[0].time);
            }
            t += 0.125;
        }
    }

    #[test]
    fn test_display_and_seek_are_inverse() {
        let target = seek_target(12.0, 0.5);
        assert_eq!(target, 11.5);
        assert_eq!(display_time(target, 0.5), 12.0);
    }

    #[test]
    fn test_tracker_reports_changes_once() {
        let mut tracker = ActiveLineTracker::default();
        assert!(!tracker.update(None));
        assert!(tracker.update(Some(0)));
        assert!(!tracker.update(Some(0)));
        assert!(tracker.update(Some(1)));
        assert!(tracker.update(None));
        assert_eq!(tracker.current(), None);
    }
}
