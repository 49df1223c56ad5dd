//! Script: narration text plus publishing metadata.

use serde::{Deserialize, Serialize};

use super::error::ProviderError;
use super::fact::Fact;

/// Hashtags used when a provider returns none.
pub const DEFAULT_HASHTAGS: &[&str] = &["facts", "shorts"];

/// Closing line used by the template scripter.
pub const DEFAULT_CALL_TO_ACTION: &str = "Follow for more amazing facts!";

/// Platform length limits applied to script metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScriptLimits {
    pub max_title_chars: usize,
    pub max_description_chars: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_title_chars: 100,
            max_description_chars: 5000,
        }
    }
}

/// A video script derived from exactly one [`Fact`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Script {
    /// Opening line meant to stop the scroll.
    pub hook: String,

    /// The spoken narration. This is the exact text handed to the narrator.
    pub body: String,

    pub call_to_action: String,
    pub title: String,
    pub description: String,

    /// Hashtags without the leading `#`.
    pub hashtags: Vec<String>,

    /// Category of the source fact; narrators pick a voice from it.
    #[serde(default)]
    pub category: String,
}

impl Script {
    /// Build a plain script straight from the fact text, no language model involved.
    pub fn from_fact(fact: &Fact) -> Self {
        let hook = truncate_chars(&fact.text, 100);
        let title = if fact.text.chars().count() > 40 {
            format!("Amazing Fact: {}...", truncate_chars(&fact.text, 40))
        } else {
            format!("Amazing Fact: {}", fact.text)
        };
        Self {
            hook,
            body: fact.text.clone(),
            call_to_action: DEFAULT_CALL_TO_ACTION.to_string(),
            title,
            description: fact.text.clone(),
            hashtags: ["facts", "interesting", "shorts", "viral", "amazing"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            category: fact.category.clone(),
        }
    }

    /// Tag the script with the category of the fact it was written from.
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.trim().to_lowercase();
        self
    }

    /// Normalize a provider's script and enforce platform limits.
    ///
    /// An empty body or title is a permanent failure for that provider.
    pub fn validated(self, limits: &ScriptLimits) -> Result<Self, ProviderError> {
        let body = collapse_whitespace(&self.body);
        if body.is_empty() {
            return Err(ProviderError::permanent("script body is empty"));
        }
        let title = collapse_whitespace(&self.title);
        if title.is_empty() {
            return Err(ProviderError::permanent("script title is empty"));
        }

        let mut hashtags: Vec<String> = Vec::new();
        for tag in &self.hashtags {
            let tag: String = tag
                .trim()
                .trim_start_matches('#')
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if !tag.is_empty() && !hashtags.contains(&tag) {
                hashtags.push(tag);
            }
        }
        if hashtags.is_empty() {
            hashtags = DEFAULT_HASHTAGS.iter().map(|t| t.to_string()).collect();
        }

        Ok(Self {
            hook: collapse_whitespace(&self.hook),
            body,
            call_to_action: collapse_whitespace(&self.call_to_action),
            title: truncate_chars(&title, limits.max_title_chars),
            description: truncate_chars(self.description.trim(), limits.max_description_chars),
            hashtags,
            category: self.category.trim().to_lowercase(),
        })
    }

    /// The text the narrator speaks.
    pub fn narration_text(&self) -> &str {
        &self.body
    }

    /// Description with the hashtags appended, as uploaded.
    pub fn publish_description(&self, limits: &ScriptLimits) -> String {
        let tags = self
            .hashtags
            .iter()
            .map(|t| format!("#{t}"))
            .collect::<Vec<_>>()
            .join(" ");
        let full = if self.description.is_empty() {
            tags
        } else {
            format!("{}\n\n{}", self.description, tags)
        };
        truncate_chars(&full, limits.max_description_chars)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
