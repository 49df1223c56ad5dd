//! Provider selection: ordered per-capability lists plus per-provider
//! settings, turned into the orchestrator's [`Providers`].
//!
//! ```toml
//! [providers]
//! facts = ["api_ninjas", "static"]
//! videos = ["pexels", "pixabay"]
//!
//! [providers.pexels]
//! per_page = 10
//! ```

use std::sync::Arc;

use factreel_core::orchestrator::Providers;
use factreel_core::providers::{
    FactProvider, MusicAssetProvider, NarrationProvider, Publisher, Renderer, ScriptProvider,
    VideoAssetProvider,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::facts::{ApiNinjasFacts, ApiNinjasSettings, StaticFacts, StaticFactsSettings};
use crate::music::{LocalMusicDir, MusicDirSettings};
use crate::narration::{CommandNarrator, TtsSettings};
use crate::publish::{CommandPublisher, UploadSettings};
use crate::render::{FfmpegRenderer, FfmpegSettings};
use crate::scripts::{OpenRouterScripts, OpenRouterSettings, TemplateScripts};
use crate::video::{PexelsSettings, PexelsVideos, PixabaySettings, PixabayVideos};

/// Errors raised while assembling providers.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no usable {0} provider configured")]
    NoProviders(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to load static fact pool: {0}")]
    FactPool(#[from] std::io::Error),

    #[error("invalid tts settings: {0}")]
    Tts(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FactSource {
    ApiNinjas,
    Static,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptSource {
    #[serde(rename = "openrouter")]
    OpenRouter,
    Template,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NarrationSource {
    Command,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VideoSource {
    Pexels,
    Pixabay,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MusicSource {
    LocalDir,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenderSource {
    Ffmpeg,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublishSource {
    Command,
}

/// API keys. Never serialized; the CLI fills these from the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_ninjas: Option<String>,
    pub openrouter: Option<String>,
    pub pexels: Option<String>,
    pub pixabay: Option<String>,
}

/// Which providers run, in fallback order, and how each is set up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub facts: Vec<FactSource>,
    pub scripts: Vec<ScriptSource>,
    pub narration: Vec<NarrationSource>,
    pub videos: Vec<VideoSource>,
    pub music: Vec<MusicSource>,
    pub render: Vec<RenderSource>,
    pub publish: Vec<PublishSource>,

    pub api_ninjas: ApiNinjasSettings,
    pub static_facts: StaticFactsSettings,
    pub openrouter: OpenRouterSettings,
    pub tts: TtsSettings,
    pub pexels: PexelsSettings,
    pub pixabay: PixabaySettings,
    pub music_dir: MusicDirSettings,
    pub ffmpeg: FfmpegSettings,
    pub upload: UploadSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            facts: vec![FactSource::ApiNinjas, FactSource::Static],
            scripts: vec![ScriptSource::OpenRouter, ScriptSource::Template],
            narration: vec![NarrationSource::Command],
            videos: vec![VideoSource::Pexels, VideoSource::Pixabay],
            music: vec![MusicSource::LocalDir],
            render: vec![RenderSource::Ffmpeg],
            publish: vec![PublishSource::Command],
            api_ninjas: ApiNinjasSettings::default(),
            static_facts: StaticFactsSettings::default(),
            openrouter: OpenRouterSettings::default(),
            tts: TtsSettings::default(),
            pexels: PexelsSettings::default(),
            pixabay: PixabaySettings::default(),
            music_dir: MusicDirSettings::default(),
            ffmpeg: FfmpegSettings::default(),
            upload: UploadSettings::default(),
        }
    }
}

/// Take a key, or log that `provider` is skipped for lack of one.
fn key(value: &Option<String>, provider: &str, env: &str) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(k) if !k.is_empty() => Some(k.to_string()),
        _ => {
            warn!(provider = %provider, env = %env, "API key not set, provider skipped");
            None
        }
    }
}

fn require_some<T>(list: Vec<T>, capability: &'static str) -> Result<Vec<T>, BuildError> {
    if list.is_empty() {
        return Err(BuildError::NoProviders(capability));
    }
    Ok(list)
}

impl ProvidersConfig {
    /// Instantiate every listed provider in list order.
    ///
    /// Keyed providers without a key are skipped. Every required capability
    /// must end up with at least one provider; music and publish may be empty.
    pub fn build(&self, creds: &Credentials) -> Result<Providers, BuildError> {
        let client = crate::http::client()?;

        let mut facts: Vec<Arc<dyn FactProvider>> = Vec::new();
        for source in &self.facts {
            match source {
                FactSource::ApiNinjas => {
                    if let Some(k) = key(&creds.api_ninjas, "api_ninjas", "API_NINJAS_KEY") {
                        facts.push(Arc::new(ApiNinjasFacts::new(
                            client.clone(),
                            self.api_ninjas.clone(),
                            k,
                        )));
                    }
                }
                FactSource::Static => {
                    facts.push(Arc::new(StaticFacts::from_settings(&self.static_facts)?));
                }
            }
        }

        let mut scripts: Vec<Arc<dyn ScriptProvider>> = Vec::new();
        for source in &self.scripts {
            match source {
                ScriptSource::OpenRouter => {
                    if let Some(k) = key(&creds.openrouter, "openrouter", "OPENROUTER_API_KEY") {
                        scripts.push(Arc::new(OpenRouterScripts::new(
                            client.clone(),
                            self.openrouter.clone(),
                            k,
                        )));
                    }
                }
                ScriptSource::Template => scripts.push(Arc::new(TemplateScripts)),
            }
        }

        if !self.narration.is_empty() {
            self.tts.validate().map_err(BuildError::Tts)?;
        }
        let narrators: Vec<Arc<dyn NarrationProvider>> = self
            .narration
            .iter()
            .map(|source| match source {
                NarrationSource::Command => {
                    Arc::new(CommandNarrator::new(self.tts.clone())) as Arc<dyn NarrationProvider>
                }
            })
            .collect();

        let mut videos: Vec<Arc<dyn VideoAssetProvider>> = Vec::new();
        for source in &self.videos {
            match source {
                VideoSource::Pexels => {
                    if let Some(k) = key(&creds.pexels, "pexels", "PEXELS_API_KEY") {
                        videos.push(Arc::new(PexelsVideos::new(
                            client.clone(),
                            self.pexels.clone(),
                            k,
                        )));
                    }
                }
                VideoSource::Pixabay => {
                    if let Some(k) = key(&creds.pixabay, "pixabay", "PIXABAY_API_KEY") {
                        videos.push(Arc::new(PixabayVideos::new(
                            client.clone(),
                            self.pixabay.clone(),
                            k,
                        )));
                    }
                }
            }
        }

        let renderers: Vec<Arc<dyn Renderer>> = self
            .render
            .iter()
            .map(|source| match source {
                RenderSource::Ffmpeg => {
                    Arc::new(FfmpegRenderer::new(self.ffmpeg.clone())) as Arc<dyn Renderer>
                }
            })
            .collect();

        let publishers: Vec<Arc<dyn Publisher>> = self
            .publish
            .iter()
            .map(|source| match source {
                PublishSource::Command => {
                    Arc::new(CommandPublisher::new(self.upload.clone())) as Arc<dyn Publisher>
                }
            })
            .collect();

        let music: Vec<Arc<dyn MusicAssetProvider>> = self
            .music
            .iter()
            .map(|source| match source {
                MusicSource::LocalDir => {
                    Arc::new(LocalMusicDir::new(self.music_dir.clone())) as Arc<dyn MusicAssetProvider>
                }
            })
            .collect();

        Ok(Providers {
            facts: require_some(facts, "fact")?,
            scripts: require_some(scripts, "script")?,
            narrators: require_some(narrators, "narration")?,
            videos: require_some(videos, "video")?,
            music,
            renderers: require_some(renderers, "render")?,
            publishers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<P: ?Sized + factreel_core::providers::Provider>(list: &[Arc<P>]) -> Vec<String> {
        list.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn test_lists_parse_in_order() {
        let config: ProvidersConfig = toml::from_str(
            r#"
            facts = ["static", "api_ninjas"]
            scripts = ["template"]
            videos = ["pixabay"]
            publish = []

            [pixabay]
            per_page = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.facts, vec![FactSource::Static, FactSource::ApiNinjas]);
        assert_eq!(config.scripts, vec![ScriptSource::Template]);
        assert_eq!(config.pixabay.per_page, 5);
        assert_eq!(config.pixabay.video_type, "film");
        assert_eq!(config.render, vec![RenderSource::Ffmpeg]);
        assert!(config.publish.is_empty());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let result: Result<ProvidersConfig, _> = toml::from_str(r#"facts = ["wikipedia"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_skips_keyless_providers() {
        let creds = Credentials {
            pixabay: Some("pb-key".into()),
            ..Credentials::default()
        };
        let providers = ProvidersConfig::default().build(&creds).unwrap();

        assert_eq!(names(&providers.facts), vec!["static"]);
        assert_eq!(names(&providers.scripts), vec!["template"]);
        assert_eq!(names(&providers.videos), vec!["pixabay"]);
        assert_eq!(names(&providers.renderers), vec!["ffmpeg"]);
        assert_eq!(providers.music.len(), 1);
        assert_eq!(providers.publishers.len(), 1);
    }

    #[test]
    fn test_build_keeps_configured_order() {
        let creds = Credentials {
            api_ninjas: Some("an".into()),
            openrouter: Some("or".into()),
            pexels: Some("px".into()),
            pixabay: Some("pb".into()),
        };
        let config = ProvidersConfig {
            videos: vec![VideoSource::Pixabay, VideoSource::Pexels],
            ..ProvidersConfig::default()
        };
        let providers = config.build(&creds).unwrap();

        assert_eq!(names(&providers.facts), vec!["api_ninjas", "static"]);
        assert_eq!(names(&providers.scripts), vec!["openrouter", "template"]);
        assert_eq!(names(&providers.videos), vec!["pixabay", "pexels"]);
    }

    #[test]
    fn test_voice_table_parses_and_is_checked() {
        let config: ProvidersConfig = toml::from_str(
            r#"
            [tts]
            default_voice = "calm"

            [tts.voices.calm]
            voice = "en-us+m3"
            speed = 0.9

            [tts.categories]
            story = "calm"
            "#,
        )
        .unwrap();
        assert_eq!(config.tts.voices.len(), 1);
        assert_eq!(config.tts.voices["calm"].pitch, 1.0);
        assert_eq!(config.tts.words_per_minute, 165);
        assert!(config.tts.validate().is_ok());

        let broken = ProvidersConfig {
            tts: TtsSettings {
                default_voice: "nobody".into(),
                ..config.tts.clone()
            },
            ..config
        };
        let creds = Credentials {
            pixabay: Some("pb".into()),
            ..Credentials::default()
        };
        match broken.build(&creds) {
            Err(BuildError::Tts(msg)) => assert!(msg.contains("nobody")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("build accepted an undefined default voice"),
        }
    }

    #[test]
    fn test_build_fails_without_video_provider() {
        let result = ProvidersConfig::default().build(&Credentials {
            pexels: Some("   ".into()),
            ..Credentials::default()
        });
        match result {
            Err(BuildError::NoProviders(capability)) => assert_eq!(capability, "video"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("build succeeded without a video provider"),
        }
    }
}
