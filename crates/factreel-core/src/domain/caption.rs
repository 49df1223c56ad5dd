//! Caption events produced by the timeline builder.

use serde::{Deserialize, Serialize};

/// Emphasis window for one word inside a caption event.
///
/// `char_start..char_end` is a byte range into the event text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightSpan {
    pub word_index: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub start: f64,
    pub end: f64,
}

/// One on-screen subtitle chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptionEvent {
    /// The group's words joined by single spaces.
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// Word-by-word emphasis windows; empty when the renderer shows the chunk statically.
    #[serde(default)]
    pub highlights: Vec<HighlightSpan>,
}

impl CaptionEvent {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Cut the event at `at` seconds. Returns `None` when nothing remains.
    pub fn truncated(&self, at: f64) -> Option<Self> {
        if self.start >= at {
            return None;
        }
        if self.end <= at {
            return Some(self.clone());
        }
        let highlights = self
            .highlights
            .iter()
            .filter(|h| h.start < at)
            .map(|h| HighlightSpan {
                end: h.end.min(at),
                ..h.clone()
            })
            .collect();
        Some(Self {
            text: self.text.clone(),
            start: self.start,
            end: at,
            highlights,
        })
    }
}
