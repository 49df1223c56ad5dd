//! Rendering an [`AssemblyPlan`] with ffmpeg.

use std::path::PathBuf;

use async_trait::async_trait;
use factreel_core::domain::ProviderError;
use factreel_core::planner::{AssemblyPlan, MusicMode};
use factreel_core::providers::{Provider, ProviderResult, Renderer};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::{self, stderr_tail};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FfmpegSettings {
    pub program: String,
    pub video_codec: String,
    pub preset: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub loglevel: String,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            loglevel: "error".to_string(),
        }
    }
}

fn push(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

/// The full ffmpeg argument list for `plan`. Input order matches the plan's
/// filter graph: 0 = video, 1 = narration, 2 = music.
pub fn ffmpeg_args(plan: &AssemblyPlan, settings: &FfmpegSettings) -> Vec<String> {
    let mut args = Vec::new();
    push(&mut args, &["-y", "-hide_banner", "-loglevel", settings.loglevel.as_str()]);

    if plan.video_input.loop_source {
        push(&mut args, &["-stream_loop", "-1"]);
    }
    push(&mut args, &["-i", path_arg(&plan.video_input.path).as_str()]);
    push(&mut args, &["-i", path_arg(&plan.audio_inputs.narration).as_str()]);
    if let Some(music) = &plan.audio_inputs.music {
        if music.mode == MusicMode::Loop {
            push(&mut args, &["-stream_loop", "-1"]);
        }
        push(&mut args, &["-i", path_arg(&music.path).as_str()]);
    }

    let duration = format!("{:.3}", plan.duration);
    let fps = plan.output_spec.fps.to_string();
    let output = path_arg(&plan.output_path);
    push(
        &mut args,
        &[
            "-filter_complex",
            plan.filter_graph.as_str(),
            "-map",
            "[v]",
            "-map",
            "[a]",
            "-t",
            duration.as_str(),
            "-c:v",
            settings.video_codec.as_str(),
            "-preset",
            settings.preset.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-r",
            fps.as_str(),
            "-c:a",
            settings.audio_codec.as_str(),
            "-b:a",
            settings.audio_bitrate.as_str(),
            "-movflags",
            "+faststart",
            output.as_str(),
        ],
    );
    args
}

pub struct FfmpegRenderer {
    settings: FfmpegSettings,
}

impl FfmpegRenderer {
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Provider for FfmpegRenderer {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self) -> ProviderResult<()> {
        command::probe(&self.settings.program, "-version").await
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, plan: &AssemblyPlan) -> ProviderResult<PathBuf> {
        let args = ffmpeg_args(plan, &self.settings);
        info!(
            renderer = "ffmpeg",
            output = %plan.output_path.display(),
            duration = plan.duration,
            "rendering"
        );
        let output = command::run(&self.settings.program, &args).await?;
        if !output.status.success() {
            return Err(ProviderError::RenderFailed {
                exit_code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(plan.output_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factreel_core::captions::SubtitleStyle;
    use factreel_core::domain::{MusicAsset, NarrationResult, Resolution, VisualAsset, WordTimestamp};
    use factreel_core::planner::{AssemblyPlanner, OutputSpec, RenderTarget};

    fn plan(video_secs: f64, music_secs: Option<f64>) -> AssemblyPlan {
        let video = VisualAsset {
            id: "42".into(),
            provider: "pexels".into(),
            local_path: PathBuf::from("/jobs/j/assets/pexels_42.mp4"),
            duration: video_secs,
            resolution: Some(Resolution::new(1080, 1920)),
            match_score: 1,
        };
        let narration = NarrationResult {
            audio_ref: PathBuf::from("/jobs/j/audio/narration.wav"),
            sample_rate: 22_050,
            duration_seconds: 12.0,
            word_timestamps: vec![WordTimestamp::new("hello", 0.0, 12.0)],
        };
        let music = music_secs.map(|d| MusicAsset {
            id: "calm".into(),
            provider: "local_dir".into(),
            local_path: PathBuf::from("/music/calm.mp3"),
            duration: d,
        });
        let target = RenderTarget {
            output_path: PathBuf::from("/jobs/j/final.mp4"),
            subtitle_path: PathBuf::from("/jobs/j/captions.ass"),
        };
        AssemblyPlanner::new(OutputSpec::default(), 0.2, SubtitleStyle::default()).plan(
            &video,
            &narration,
            music.as_ref(),
            &[],
            &target,
        )
    }

    fn position(args: &[String], value: &str) -> usize {
        args.iter().position(|a| a == value).unwrap()
    }

    #[test]
    fn test_args_without_music() {
        let args = ffmpeg_args(&plan(30.0, None), &FfmpegSettings::default());

        assert!(!args.contains(&"-stream_loop".to_string()));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert_eq!(args[position(&args, "-t") + 1], "12.000");
        assert_eq!(args[position(&args, "-c:v") + 1], "libx264");
        assert_eq!(args[position(&args, "-b:a") + 1], "192k");
        assert_eq!(args[position(&args, "-r") + 1], "30");
        assert_eq!(args.last().unwrap(), "/jobs/j/final.mp4");
    }

    #[test]
    fn test_short_sources_are_looped() {
        let args = ffmpeg_args(&plan(5.0, Some(4.0)), &FfmpegSettings::default());

        assert_eq!(args.iter().filter(|a| *a == "-stream_loop").count(), 2);
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 3);
        // The loop flag precedes the input it applies to.
        let video_loop = position(&args, "-stream_loop");
        assert_eq!(args[video_loop + 3], "/jobs/j/assets/pexels_42.mp4");
        assert_eq!(args[args.len() - 1], "/jobs/j/final.mp4");
    }

    #[test]
    fn test_long_music_is_not_looped() {
        let args = ffmpeg_args(&plan(30.0, Some(90.0)), &FfmpegSettings::default());
        assert!(!args.contains(&"-stream_loop".to_string()));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 3);
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_permanent() {
        let renderer = FfmpegRenderer::new(FfmpegSettings {
            program: "factreel-missing-ffmpeg".into(),
            ..FfmpegSettings::default()
        });
        let err = renderer.render(&plan(30.0, None)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Permanent(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_render_failure() {
        let renderer = FfmpegRenderer::new(FfmpegSettings {
            program: "false".into(),
            ..FfmpegSettings::default()
        });
        let err = renderer.render(&plan(30.0, None)).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::RenderFailed {
                exit_code: Some(1),
                ..
            }
        ));
    }
}
