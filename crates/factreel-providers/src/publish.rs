//! Publishing through an external upload command.
//!
//! The command receives the video path and metadata as arguments and prints
//! the remote video id as the last non-empty line of its stdout.

use std::path::Path;

use async_trait::async_trait;
use factreel_core::domain::{ProviderError, Script, ScriptLimits};
use factreel_core::providers::{Provider, ProviderResult, Publisher};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::{self, CommandSpec};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadSettings {
    /// Placeholders: `{video}`, `{title}`, `{description}`, `{tags}`.
    pub command: CommandSpec,
    pub version_flag: String,
    pub limits: ScriptLimits,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            command: CommandSpec::new(
                "youtube-upload",
                &[
                    "--title={title}",
                    "--description={description}",
                    "--tags={tags}",
                    "--privacy=public",
                    "{video}",
                ],
            ),
            version_flag: "--version".to_string(),
            limits: ScriptLimits::default(),
        }
    }
}

pub struct CommandPublisher {
    settings: UploadSettings,
}

impl CommandPublisher {
    pub fn new(settings: UploadSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Provider for CommandPublisher {
    fn name(&self) -> &str {
        "command"
    }

    async fn probe(&self) -> ProviderResult<()> {
        command::probe(&self.settings.command.program, &self.settings.version_flag).await
    }
}

#[async_trait]
impl Publisher for CommandPublisher {
    async fn upload(&self, video: &Path, script: &Script) -> ProviderResult<String> {
        let video_str = video.to_string_lossy();
        let description = script.publish_description(&self.settings.limits);
        let tags = script.hashtags.join(",");
        let args = self.settings.command.expand(&[
            ("video", video_str.as_ref()),
            ("title", script.title.as_str()),
            ("description", description.as_str()),
            ("tags", tags.as_str()),
        ]);

        let output = command::run_checked(&self.settings.command.program, &args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let remote_id = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .ok_or_else(|| ProviderError::permanent("upload command printed no video id"))?
            .to_string();
        info!(publisher = "command", remote_id = %remote_id, "video published");
        Ok(remote_id)
    }
}
