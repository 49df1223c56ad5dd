//! Word timing: normalization of provider timestamps and fixed-rate interpolation.

use crate::domain::{NarrationTimingError, WordTimestamp};

/// Fraction of its slot an interpolated word is shown for.
const INTERPOLATED_FILL: f64 = 0.95;

/// Repair raw word timings against the narration text and audio duration.
///
/// The output has one entry per whitespace-separated word of `text`, in the
/// same order, carrying the text's own spelling. Every entry satisfies
/// `0 <= start < end <= duration`, and entries never overlap. Zero-length
/// words are widened to a floor of `min_word_secs` (shrunk when the audio is
/// too short to give every word that much).
pub fn normalize_word_timestamps(
    text: &str,
    raw: &[WordTimestamp],
    duration: f64,
    min_word_secs: f64,
) -> Result<Vec<WordTimestamp>, NarrationTimingError> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(NarrationTimingError::InvalidDuration(duration));
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() != raw.len() {
        return Err(NarrationTimingError::CountMismatch {
            words: words.len(),
            timestamps: raw.len(),
        });
    }
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let n = words.len();
    let floor = min_word_secs.max(1e-3).min(duration / n as f64);
    let sanitize = |t: f64| if t.is_finite() { t.clamp(0.0, duration) } else { 0.0 };

    // Forward pass: starts are monotonic, at least `floor` apart, and leave
    // room for every remaining word before `duration`.
    let mut starts = Vec::with_capacity(n);
    for (i, entry) in raw.iter().enumerate() {
        let latest = (duration - (n - i) as f64 * floor).max(0.0);
        let earliest = match starts.last() {
            Some(prev) => prev + floor,
            None => 0.0,
        };
        starts.push(sanitize(entry.start).min(latest).max(earliest));
    }

    let mut out = Vec::with_capacity(n);
    for (i, (entry, word)) in raw.iter().zip(words.iter()).enumerate() {
        let start = starts[i];
        let mut end = sanitize(entry.end).max(start + floor);
        end = match starts.get(i + 1) {
            Some(next) => end.min(*next),
            None => end.min(duration),
        };
        out.push(WordTimestamp {
            word: (*word).to_string(),
            start,
            end,
            confidence: entry.confidence,
        });
    }
    Ok(out)
}

/// Spread the words of `text` evenly over `duration`.
///
/// Each word gets `duration / n` seconds and is shown for 95% of it. This is
/// the degraded producer for narrators that cannot report word timings.
pub fn interpolate_word_timestamps(text: &str, duration: f64) -> Vec<WordTimestamp> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }
    let slot = duration / words.len() as f64;
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let start = i as f64 * slot;
            WordTimestamp::new(*word, start, start + slot * INTERPOLATED_FILL)
        })
        .collect()
}
