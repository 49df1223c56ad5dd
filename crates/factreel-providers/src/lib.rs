//! factreel providers
//!
//! Concrete implementations of the capability traits in
//! `factreel_core::providers`: HTTP clients for fact, script and stock-video
//! APIs, and command-line collaborators for speech, rendering and upload.
//! [`ProvidersConfig::build`] wires a configured selection into the
//! orchestrator's `Providers`.

pub mod command;
pub mod config;
pub mod facts;
pub mod http;
pub mod music;
pub mod narration;
pub mod publish;
pub mod render;
pub mod scripts;
pub mod video;

pub use command::CommandSpec;
pub use config::{
    BuildError, Credentials, FactSource, MusicSource, NarrationSource, ProvidersConfig,
    PublishSource, RenderSource, ScriptSource, VideoSource,
};
pub use facts::{ApiNinjasFacts, StaticFacts};
pub use music::LocalMusicDir;
pub use narration::{CommandNarrator, TtsSettings, VoiceProfile};
pub use publish::CommandPublisher;
pub use render::FfmpegRenderer;
pub use scripts::{OpenRouterScripts, TemplateScripts};
pub use video::{PexelsVideos, PixabayVideos};
