//! Fact: the seed text of a video.

use serde::{Deserialize, Serialize};

use super::error::ProviderError;

/// Facts shorter than this are rejected as unusable.
pub const MIN_FACT_CHARS: usize = 10;

/// A short factual statement fetched from a fact provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fact {
    /// The fact itself, whitespace-collapsed and punctuated.
    pub text: String,

    /// Provider-supplied category ("random" when the source has none).
    pub category: String,

    /// Identifier of the record at the source, for traceability.
    pub source_id: String,
}

impl Fact {
    pub fn new(
        text: impl Into<String>,
        category: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            source_id: source_id.into(),
        }
    }

    /// Clean and validate a freshly fetched fact.
    ///
    /// Collapses whitespace and appends a full stop when the text has no
    /// terminal punctuation. Too-short text is a permanent provider failure,
    /// so the fallback chain moves on to the next source.
    pub fn validated(self) -> Result<Self, ProviderError> {
        let mut text = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() < MIN_FACT_CHARS {
            return Err(ProviderError::permanent(format!(
                "fact too short ({} chars): {:?}",
                text.chars().count(),
                text
            )));
        }
        if !text.ends_with(['.', '!', '?']) {
            text.push('.');
        }
        Ok(Self { text, ..self })
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
