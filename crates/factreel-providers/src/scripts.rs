//! Script writers: an OpenRouter chat-completion client and a template
//! writer that turns the fact itself into the narration.

use async_trait::async_trait;
use factreel_core::domain::script::DEFAULT_CALL_TO_ACTION;
use factreel_core::domain::{Fact, ProviderError, Script};
use factreel_core::providers::{Provider, ProviderResult, ScriptProvider};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::http::{classify_error, read_json};

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const SCRIPT_PROMPT: &str = r#"You are a viral YouTube Shorts scriptwriter. Create an ENGAGING, ENTHUSIASTIC script from this fact.

FACT: {fact}

YOUR TASK: Transform this dry fact into an EXCITING 30-second narration script.

IMPORTANT RULES:
1. Start with a question or shocking statement to hook viewers
2. Explain the fact in simple, conversational language
3. Add excitement with phrases like "Believe it or not!", "Get this:", "Here's the crazy part:"
4. End with "Follow for more amazing facts!"
5. Write EXACTLY as someone would SPEAK it out loud
6. Keep it under 50 words total

Return ONLY valid JSON with no other text:
{
    "hook": "Opening question or shocking statement",
    "script": "Your complete engaging narration script (40-50 words)",
    "title": "Catchy title (under 60 chars)",
    "description": "Brief description",
    "hashtags": ["facts", "interesting", "shorts"]
}"#;

pub fn script_prompt(fact: &Fact) -> String {
    SCRIPT_PROMPT.replace("{fact}", &fact.text)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenRouterSettings {
    pub url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for OpenRouterSettings {
    fn default() -> Self {
        Self {
            url: OPENROUTER_URL.to_string(),
            model: "mistralai/mistral-7b-instruct:free".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// The JSON object the model is asked to answer with.
#[derive(Debug, Deserialize)]
struct ScriptReply {
    hook: String,
    script: String,
    title: String,
    description: String,
    #[serde(default)]
    hashtags: Vec<String>,
}

/// Strip a Markdown code fence around the model's answer, if any.
fn unfence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let inner = if let Some((_, rest)) = trimmed.split_once("```json") {
        rest
    } else if let Some((_, rest)) = trimmed.split_once("```") {
        rest
    } else {
        return trimmed;
    };
    inner.split("```").next().unwrap_or(inner).trim()
}

/// Parse the model's answer into a script. An answer that is not the
/// requested JSON object is a permanent failure, so the chain moves on.
pub fn parse_script_reply(reply: &str) -> ProviderResult<Script> {
    let parsed: ScriptReply = serde_json::from_str(unfence(reply))
        .map_err(|e| ProviderError::permanent(format!("script reply is not valid JSON: {e}")))?;
    Ok(Script {
        hook: parsed.hook,
        body: parsed.script,
        call_to_action: DEFAULT_CALL_TO_ACTION.to_string(),
        title: parsed.title,
        description: parsed.description,
        hashtags: parsed.hashtags,
        category: String::new(),
    })
}

/// Script generation through OpenRouter's chat completions API.
pub struct OpenRouterScripts {
    client: reqwest::Client,
    settings: OpenRouterSettings,
    api_key: String,
}

impl OpenRouterScripts {
    pub fn new(client: reqwest::Client, settings: OpenRouterSettings, api_key: String) -> Self {
        Self {
            client,
            settings,
            api_key,
        }
    }

    async fn complete(&self, prompt: &str) -> ProviderResult<String> {
        let payload = json!({
            "model": self.settings.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
        });
        let response = self
            .client
            .post(&self.settings.url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "factreel")
            .json(&payload)
            .send()
            .await
            .map_err(|e| classify_error(&e))?;
        let body: ChatResponse = read_json(response).await?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::permanent("completion has no choices"))
    }
}

#[async_trait]
impl Provider for OpenRouterScripts {
    fn name(&self) -> &str {
        "openrouter"
    }
}

#[async_trait]
impl ScriptProvider for OpenRouterScripts {
    async fn generate(&self, fact: &Fact) -> ProviderResult<Script> {
        info!(provider = "openrouter", model = %self.settings.model, "generating script");
        let reply = self.complete(&script_prompt(fact)).await?;
        debug!(chars = reply.len(), "completion received");
        parse_script_reply(&reply).map(|script| script.with_category(&fact.category))
    }
}

/// Narrates the fact verbatim with a generated title and stock hashtags.
pub struct TemplateScripts;

#[async_trait]
impl Provider for TemplateScripts {
    fn name(&self) -> &str {
        "template"
    }
}

#[async_trait]
impl ScriptProvider for TemplateScripts {
    async fn generate(&self, fact: &Fact) -> ProviderResult<Script> {
        Ok(Script::from_fact(fact))
    }
}
