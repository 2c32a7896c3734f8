//! Synchronized lyric timeline parsed from LRC-style text.

use crate::sync;
use serde::{Deserialize, Serialize};

/// A single lyric line with its start time in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    /// Stable id, `line-<n>` where `n` is the line's index in the source text
    pub id: String,
    /// Start time in seconds from the beginning of the track
    pub time: f64,
    pub text: String,
}

impl LyricLine {
    pub fn new(id: impl Into<String>, time: f64, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            time,
            text: text.into(),
        }
    }
}

/// Metadata carried by LRC ID tags such as `[ti:Title]`.
///
/// Tags are informational only. In particular an `[offset:]` tag is never
/// applied to line times; the user-adjustable sync offset replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LrcMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub author: Option<String>,
    pub length_secs: Option<f64>,
}

/// Immutable ordered sequence of timed lyric lines.
///
/// Lines keep the order in which they appear in the source. Nothing is
/// re-sorted, so unordered input yields an unordered timeline and line
/// resolution falls back to its first-match tie-break.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricTimeline {
    metadata: LrcMetadata,
    lines: Vec<LyricLine>,
}

impl LyricTimeline {
    /// Parse synchronized lyrics text.
    ///
    /// Every line of the form `[MM:SS.ff]text` or `[MM:SS.fff]text` becomes a
    /// [`LyricLine`]; anything else is dropped. The fraction is read as a
    /// decimal, so `.50` and `.500` are the same instant. Input without a
    /// single timed line produces an empty timeline, which is how
    /// instrumental tracks are represented.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut metadata = LrcMetadata::default();
        let mut lines = Vec::new();

        for (index, raw) in input.lines().enumerate() {
            if let Some((time, text)) = parse_timed_line(raw) {
                lines.push(LyricLine {
                    id: format!("line-{index}"),
                    time,
                    text: text.to_string(),
                });
                continue;
            }

            if let Some((tag, value)) = parse_id_tag(raw.trim()) {
                match tag.to_lowercase().as_str() {
                    "ti" => metadata.title = Some(value),
                    "ar" => metadata.artist = Some(value),
                    "al" => metadata.album = Some(value),
                    "au" => metadata.author = Some(value),
                    "length" => metadata.length_secs = parse_length_tag(&value),
                    _ => {}
                }
            }
        }

        Self { metadata, lines }
    }

    /// Build a timeline from already-timed lines, keeping their order.
    #[must_use]
    pub fn from_lines(lines: Vec<LyricLine>) -> Self {
        Self {
            metadata: LrcMetadata::default(),
            lines,
        }
    }

    /// An empty timeline (no synchronized lyrics).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    #[must_use]
    pub fn metadata(&self) -> &LrcMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&LyricLine> {
        self.lines.get(index)
    }

    /// Start time of the first line, if any.
    #[must_use]
    pub fn first_time(&self) -> Option<f64> {
        self.lines.first().map(|line| line.time)
    }

    /// Index of the line active at `display_time`.
    #[must_use]
    pub fn active_index(&self, display_time: f64) -> Option<usize> {
        sync::resolve(display_time, &self.lines)
    }

    /// Lines around `index` for compact display.
    ///
    /// With no active line the first `after + 1` lines are returned.
    #[must_use]
    pub fn window(&self, index: Option<usize>, before: usize, after: usize) -> &[LyricLine] {
        let Some(index) = index else {
            let end = (after + 1).min(self.lines.len());
            return &self.lines[..end];
        };

        let start = index.saturating_sub(before).min(self.lines.len());
        let end = index
            .saturating_add(after)
            .saturating_add(1)
            .min(self.lines.len());
        &self.lines[start..end]
    }
}

/// Parse `[MM:SS.ff]text`, returning the time in seconds and the trimmed text.
fn parse_timed_line(line: &str) -> Option<(f64, &str)> {
    let rest = line.strip_prefix('[')?;
    let (stamp, text) = rest.split_once(']')?;
    let time = parse_timestamp(stamp)?;

    // The text ends at the first line terminator
    let text = text
        .split(['\r', '\u{2028}', '\u{2029}'])
        .next()
        .unwrap_or_default()
        .trim();

    Some((time, text))
}

/// Parse `MM:SS.ff` or `MM:SS.fff`
fn parse_timestamp(stamp: &str) -> Option<f64> {
    let (minutes, rest) = stamp.split_once(':')?;
    let (seconds, fraction) = rest.split_once('.')?;

    if !is_digits(minutes, 2, 2) || !is_digits(seconds, 2, 2) || !is_digits(fraction, 2, 3) {
        return None;
    }

    let minutes: u32 = minutes.parse().ok()?;
    let seconds: u32 = seconds.parse().ok()?;
    let fraction: f64 = format!("0.{fraction}").parse().ok()?;

    Some(f64::from(minutes) * 60.0 + f64::from(seconds) + fraction)
}

fn is_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an ID tag like [ti:Title] or [ar:Artist]
fn parse_id_tag(line: &str) -> Option<(String, String)> {
    let content = line.strip_prefix('[')?;
    let end = content.find(']')?;
    let content = &content[..end];

    let (tag, value) = content.split_once(':')?;

    // If the tag part looks like a number, it's a (malformed) timestamp
    if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some((tag.trim().to_string(), value.trim().to_string()))
}

/// Parse a length tag like "mm:ss" or "mm:ss.xx" into seconds
fn parse_length_tag(s: &str) -> Option<f64> {
    let (minutes, seconds) = s.split_once(':')?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;

    Some(f64::from(minutes) * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_lines() {
        let timeline = LyricTimeline::parse("[00:01.50]Hello\n[00:02.00]World");
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.lines()[0].time, 1.5);
        assert_eq!(timeline.lines()[0].text, "Hello");
        assert_eq!(timeline.lines()[1].time, 2.0);
        assert_eq!(timeline.lines()[1].text, "World");
        assert_ne!(timeline.lines()[0].id, timeline.lines()[1].id);
    }

    #[test]
    fn test_malformed_lines_dropped() {
        let timeline = LyricTimeline::parse("not a lyric line\n[00:01.00]OK");
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.lines()[0].time, 1.0);
        assert_eq!(timeline.lines()[0].text, "OK");
    }

    #[test]
    fn test_ids_use_source_index() {
        let timeline = LyricTimeline::parse("[ti:Song]\n\n[00:05.00]First\n[00:06.00]Second");
        assert_eq!(timeline.lines()[0].id, "line-2");
        assert_eq!(timeline.lines()[1].id, "line-3");
    }

    #[test]
    fn test_fraction_is_decimal() {
        let timeline = LyricTimeline::parse("[00:00.50]a\n[00:00.500]b\n[00:00.123]c");
        assert_eq!(timeline.lines()[0].time, timeline.lines()[1].time);
        assert_eq!(timeline.lines()[2].time, 0.123);
    }

    #[test]
    fn test_minutes_and_seconds() {
        let timeline = LyricTimeline::parse("[02:03.25]Chorus");
        assert_eq!(timeline.lines()[0].time, 123.25);
    }

    #[test]
    fn test_text_trimmed_and_crlf() {
        let timeline = LyricTimeline::parse("[00:01.00]  spaced out  \r\n[00:02.00]\r\n");
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.lines()[0].text, "spaced out");
        assert_eq!(timeline.lines()[1].text, "");
    }

    #[test]
    fn test_rejects_loose_timestamps() {
        let input = "[0:01.00]one digit minute\n\
                     [00:1.00]one digit second\n\
                     [00:01.0]one digit fraction\n\
                     [00:01.0000]four digit fraction\n\
                     [00:01]no fraction\n\
                     [00:01:00]colon fraction\n \
                     [00:01.00]leading space";
        assert!(LyricTimeline::parse(input).is_empty());
    }

    #[test]
    fn test_no_resort() {
        let timeline = LyricTimeline::parse("[00:10.00]late\n[00:05.00]early");
        assert_eq!(timeline.lines()[0].text, "late");
        assert_eq!(timeline.lines()[1].text, "early");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let input = "[00:03.00]c\n[00:01.00]a\n[00:01.00]dup";
        assert_eq!(LyricTimeline::parse(input), LyricTimeline::parse(input));
    }

    #[test]
    fn test_empty_input_is_instrumental() {
        let timeline = LyricTimeline::parse("[ar:Someone]\n[ti:Instrumental]");
        assert!(timeline.is_empty());
        assert_eq!(timeline.first_time(), None);
    }

    #[test]
    fn test_metadata_tags() {
        let input = "[ti:Song Title]\n[ar:Artist Name]\n[al:Album]\n[length: 03:21]\n[offset:500]\n[00:05.00]Lyrics";
        let timeline = LyricTimeline::parse(input);
        let metadata = timeline.metadata();
        assert_eq!(metadata.title.as_deref(), Some("Song Title"));
        assert_eq!(metadata.artist.as_deref(), Some("Artist Name"));
        assert_eq!(metadata.album.as_deref(), Some("Album"));
        assert_eq!(metadata.length_secs, Some(201.0));
        // The offset tag never shifts line times
        assert_eq!(timeline.lines()[0].time, 5.0);
    }

    #[test]
    fn test_window() {
        let input = "[00:01.00]1\n[00:02.00]2\n[00:03.00]3\n[00:04.00]4\n[00:05.00]5";
        let timeline = LyricTimeline::parse(input);

        let around = timeline.window(Some(2), 1, 1);
        let texts: Vec<_> = around.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["2", "3", "4"]);

        let start = timeline.window(None, 1, 1);
        assert_eq!(start.len(), 2);

        let end = timeline.window(Some(4), 2, 3);
        assert_eq!(end.len(), 3);
    }

    #[test]
    fn test_cjk_text() {
        let timeline = LyricTimeline::parse("[00:05.00]你好世界");
        assert_eq!(timeline.lines()[0].text, "你好世界");
    }
}
