//! Narration audio and word timing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Timing of one spoken word, in seconds from the start of the audio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordTimestamp {
    pub word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl WordTimestamp {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
            confidence: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Synthesized speech plus word-level timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NarrationResult {
    /// Audio file inside the job directory.
    pub audio_ref: PathBuf,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub word_timestamps: Vec<WordTimestamp>,
}

impl NarrationResult {
    pub fn word_count(&self) -> usize {
        self.word_timestamps.len()
    }

    /// The narration text as reconstructed from the timed words.
    pub fn text(&self) -> String {
        self.word_timestamps
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
