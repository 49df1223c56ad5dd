//! Caption timeline: word timings grouped into on-screen subtitle chunks.
//!
//! [`build_caption_timeline`] turns normalized word timestamps into ordered,
//! non-overlapping [`CaptionEvent`]s. [`ass`] renders them as an ASS track
//! with karaoke tags for burn-in.

pub mod ass;

use serde::{Deserialize, Serialize};

use crate::domain::{CaptionEvent, HighlightSpan, WordTimestamp};

pub use ass::{render_ass, SubtitleStyle};

/// Chunking thresholds for the timeline builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptionPolicy {
    /// Most words shown at once.
    pub max_words: usize,
    /// Longest a single caption may stay on screen.
    pub max_duration_secs: f64,
    /// Largest uncaptioned stretch tolerated by coverage checks.
    pub silence_threshold_secs: f64,
}

impl Default for CaptionPolicy {
    fn default() -> Self {
        Self {
            max_words: 3,
            max_duration_secs: 2.5,
            silence_threshold_secs: 0.75,
        }
    }
}

fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(['"', '\'', ')', ']'])
        .ends_with(['.', '!', '?'])
}

/// Group words greedily into caption events.
///
/// A group closes when adding the next word would exceed `max_words` or
/// stretch the group past `max_duration_secs`, and after any word that ends
/// a sentence. Input must already be normalized (ordered, non-overlapping).
pub fn build_caption_timeline(words: &[WordTimestamp], policy: &CaptionPolicy) -> Vec<CaptionEvent> {
    let max_words = policy.max_words.max(1);
    let mut events = Vec::new();
    let mut group: Vec<&WordTimestamp> = Vec::new();

    for word in words {
        if let Some(first) = group.first() {
            let too_many = group.len() >= max_words;
            let too_long = word.end - first.start > policy.max_duration_secs;
            if too_many || too_long {
                events.push(close_group(&group, policy.max_duration_secs));
                group.clear();
            }
        }
        group.push(word);
        if ends_sentence(&word.word) {
            events.push(close_group(&group, policy.max_duration_secs));
            group.clear();
        }
    }
    if !group.is_empty() {
        events.push(close_group(&group, policy.max_duration_secs));
    }
    events
}

fn close_group(group: &[&WordTimestamp], max_duration: f64) -> CaptionEvent {
    let start = group[0].start;
    let last_end = group[group.len() - 1].end;
    // A lone word longer than the cap is cut short.
    let end = last_end.min(start + max_duration);

    let mut text = String::new();
    let mut highlights = Vec::with_capacity(group.len());
    for (i, word) in group.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        let char_start = text.len();
        text.push_str(&word.word);
        let window_end = group.get(i + 1).map(|next| next.start).unwrap_or(end);
        highlights.push(HighlightSpan {
            word_index: i,
            char_start,
            char_end: text.len(),
            start: word.start.min(end),
            end: window_end.min(end),
        });
    }

    CaptionEvent {
        text,
        start,
        end,
        highlights,
    }
}

/// Caption text with chunk boundaries removed.
pub fn timeline_text(events: &[CaptionEvent]) -> String {
    events
        .iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Longest stretch of `[0, duration]` not covered by any event.
pub fn max_uncovered_gap(events: &[CaptionEvent], duration: f64) -> f64 {
    let mut cursor = 0.0_f64;
    let mut gap = 0.0_f64;
    for event in events {
        gap = gap.max(event.start - cursor);
        cursor = cursor.max(event.end);
    }
    gap.max(duration - cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::interpolate_word_timestamps;

    fn words(spec: &[(&str, f64, f64)]) -> Vec<WordTimestamp> {
        spec.iter()
            .map(|(w, s, e)| WordTimestamp::new(*w, *s, *e))
            .collect()
    }

    #[test]
    fn test_groups_respect_word_cap() {
        let text = "one two three four five six seven";
        let ws = interpolate_word_timestamps(text, 3.5);
        let events = build_caption_timeline(&ws, &CaptionPolicy::default());
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].text, "one two three");
        assert_eq!(events[2].text, "seven");
        assert_eq!(timeline_text(&events), text);
    }

    #[test]
    fn test_sentence_end_closes_group() {
        let ws = words(&[
            ("Wow.", 0.0, 0.3),
            ("Octopuses", 0.3, 0.8),
            ("have", 0.8, 1.0),
            ("hearts!", 1.0, 1.4),
            ("Really", 1.4, 1.8),
        ]);
        let events = build_caption_timeline(&ws, &CaptionPolicy::default());
        let texts: Vec<_> = events.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Wow.", "Octopuses have hearts!", "Really"]);
    }

    #[test]
    fn test_duration_cap_splits_slow_words() {
        let ws = words(&[("slow", 0.0, 1.5), ("speech", 1.5, 3.0), ("here", 3.0, 3.2)]);
        let policy = CaptionPolicy {
            max_words: 5,
            max_duration_secs: 2.0,
            ..CaptionPolicy::default()
        };
        let events = build_caption_timeline(&ws, &policy);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text, "slow");
        assert_eq!(events[1].text, "speech here");
        for e in &events {
            assert!(e.duration() <= 2.0);
        }
    }

    #[test]
    fn test_single_long_word_is_capped() {
        let ws = words(&[("Mississippi", 0.0, 4.0)]);
        let events = build_caption_timeline(&ws, &CaptionPolicy::default());
        assert_eq!(events[0].end, 2.5);
        assert_eq!(events[0].highlights[0].end, 2.5);
    }

    #[test]
    fn test_highlights_walk_word_boundaries() {
        let ws = words(&[("three", 1.0, 1.3), ("big", 1.4, 1.6), ("hearts", 1.6, 2.0)]);
        let events = build_caption_timeline(&ws, &CaptionPolicy::default());
        let event = &events[0];
        assert_eq!(event.highlights.len(), 3);
        let h = &event.highlights[1];
        assert_eq!(&event.text[h.char_start..h.char_end], "big");
        assert_eq!((h.start, h.end), (1.4, 1.6));
        // Emphasis windows are contiguous across pauses.
        assert_eq!(event.highlights[0].end, 1.4);
        assert_eq!(event.highlights[2].end, event.end);
    }

    #[test]
    fn test_events_never_overlap() {
        let text = "Honey never spoils. Archaeologists have found pots of honey in ancient Egyptian tombs that are over three thousand years old!";
        let ws = interpolate_word_timestamps(text, 9.0);
        let events = build_caption_timeline(&ws, &CaptionPolicy::default());
        for pair in events.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        for e in &events {
            assert!(e.duration() <= 2.5);
            assert!(e.end <= 9.0);
        }
        assert_eq!(timeline_text(&events), text);
    }

    #[test]
    fn test_max_uncovered_gap() {
        let ws = words(&[("a", 0.2, 0.5), ("b.", 0.5, 1.0), ("c", 2.0, 2.5)]);
        let events = build_caption_timeline(&ws, &CaptionPolicy::default());
        let gap = max_uncovered_gap(&events, 3.0);
        assert!((gap - 1.0).abs() < 1e-9);
        assert_eq!(max_uncovered_gap(&[], 3.0), 3.0);
    }
}
