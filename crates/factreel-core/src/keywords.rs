//! Search keyword extraction and the stemmer used for keyword matching.

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "that", "this", "these",
    "those", "i", "you", "he", "she", "it", "we", "they", "their", "them", "over", "years",
    "year", "however", "because", "only", "also", "when", "made", "make", "used", "than",
    "there", "which", "about", "into", "more", "most", "some", "what", "your",
];

/// Words that make good stock-footage queries; tokens containing one go first.
const PRIORITY_INDICATORS: &[&str] = &[
    "pyramid", "ocean", "mountain", "space", "animal", "city", "country", "planet", "star",
    "galaxy", "earth", "sun", "moon",
];

/// Generic topics appended when the text yields fewer than two keywords.
const FALLBACK_KEYWORDS: &[&str] = &["nature", "science", "discovery"];

const MIN_KEYWORD_CHARS: usize = 4;

/// Extract up to `max` search keywords from fact or script text.
///
/// Tokens are lower-cased and stripped of surrounding punctuation; short
/// tokens and stop words are dropped. Priority tokens keep their relative
/// order but come before the rest.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut priority: Vec<String> = Vec::new();
    let mut regular: Vec<String> = Vec::new();

    for raw in text.split_whitespace() {
        let word = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.chars().count() < MIN_KEYWORD_CHARS || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        let bucket = if PRIORITY_INDICATORS.iter().any(|p| word.contains(p)) {
            &mut priority
        } else {
            &mut regular
        };
        if !bucket.contains(&word) {
            bucket.push(word);
        }
    }

    let mut keywords = priority;
    keywords.extend(regular);
    if keywords.len() < 2 {
        for fallback in FALLBACK_KEYWORDS {
            if !keywords.iter().any(|k| k == fallback) {
                keywords.push((*fallback).to_string());
            }
        }
    }
    keywords.truncate(max);
    keywords
}

/// Reduce an English word to a crude stem so "hearts" matches "heart".
pub fn stem(word: &str) -> String {
    let w = word.to_lowercase();
    let n = w.len();
    if n > 4 && w.ends_with("ies") {
        return format!("{}y", &w[..n - 3]);
    }
    if n > 4 && (w.ends_with("ches") || w.ends_with("shes") || w.ends_with("xes") || w.ends_with("ses")) {
        return w[..n - 2].to_string();
    }
    if n > 5 && w.ends_with("ing") {
        return w[..n - 3].to_string();
    }
    if n > 4 && w.ends_with("ed") {
        return w[..n - 2].to_string();
    }
    if n > 3 && w.ends_with('s') && !w.ends_with("ss") && !w.ends_with("us") {
        return w[..n - 1].to_string();
    }
    w
}
