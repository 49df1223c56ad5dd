//! Assembly planning: a pure, deterministic description of the final render.
//!
//! [`AssemblyPlanner::plan`] combines the selected assets, the narration and
//! the caption timeline into an [`AssemblyPlan`]. The planner never touches
//! the filesystem or the renderer; identical inputs always give an identical
//! plan (and digest).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::captions::{render_ass, SubtitleStyle};
use crate::domain::{CaptionEvent, MusicAsset, NarrationResult, VisualAsset};

/// Target frame, rate and length of the rendered video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub max_duration_secs: f64,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            max_duration_secs: 60.0,
        }
    }
}

/// Where the renderer writes its outputs for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    pub output_path: PathBuf,
    pub subtitle_path: PathBuf,
}

/// How the source video is made to fill the frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VideoFit {
    /// Source size known: scale to cover, then centre-crop.
    Exact {
        scale_width: u32,
        scale_height: u32,
        crop_x: u32,
        crop_y: u32,
    },
    /// Source size unknown: the renderer scales to cover and centre-crops.
    CoverAuto,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MusicMode {
    /// Track shorter than the output; repeat it.
    Loop,
    /// Track at least as long as the output; cut it.
    Trim,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoInput {
    pub path: PathBuf,
    pub source_duration: f64,
    /// Source shorter than the output; repeat it.
    pub loop_source: bool,
    pub fit: VideoFit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MusicInput {
    pub path: PathBuf,
    pub source_duration: f64,
    pub mode: MusicMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioInputs {
    pub narration: PathBuf,
    pub music: Option<MusicInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MixLevels {
    pub narration_gain: f64,
    pub music_gain: f64,
}

/// Styled caption events ready for burn-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtitleTrack {
    pub path: PathBuf,
    pub style: SubtitleStyle,
    pub events: Vec<CaptionEvent>,
}

/// Everything the renderer needs to produce one video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssemblyPlan {
    pub video_input: VideoInput,
    pub audio_inputs: AudioInputs,
    pub subtitle_track: SubtitleTrack,
    pub output_spec: OutputSpec,
    pub mix_levels: MixLevels,
    /// Length of every output stream.
    pub duration: f64,
    /// Narration was longer than `output_spec.max_duration_secs`.
    pub truncated: bool,
    /// ffmpeg filter graph; inputs are 0 = video, 1 = narration, 2 = music.
    pub filter_graph: String,
    pub output_path: PathBuf,
}

impl AssemblyPlan {
    /// SHA-256 hex digest of the plan's JSON form.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// The subtitle track as an ASS document sized to the output frame.
    pub fn subtitle_document(&self) -> String {
        render_ass(
            &self.subtitle_track.events,
            &self.subtitle_track.style,
            self.output_spec.width,
            self.output_spec.height,
        )
    }
}

/// Builds assembly plans from a fixed output configuration.
#[derive(Debug, Clone)]
pub struct AssemblyPlanner {
    output: OutputSpec,
    music_gain: f64,
    style: SubtitleStyle,
}

impl AssemblyPlanner {
    pub fn new(output: OutputSpec, music_gain: f64, style: SubtitleStyle) -> Self {
        Self {
            output,
            music_gain,
            style,
        }
    }

    /// Plan the render of one job.
    ///
    /// The output lasts as long as the narration, capped at
    /// `max_duration_secs`; video, audio and captions are all cut at that
    /// same timestamp.
    pub fn plan(
        &self,
        video: &VisualAsset,
        narration: &NarrationResult,
        music: Option<&MusicAsset>,
        captions: &[CaptionEvent],
        target: &RenderTarget,
    ) -> AssemblyPlan {
        let duration = narration.duration_seconds.min(self.output.max_duration_secs);
        let truncated = narration.duration_seconds > self.output.max_duration_secs;

        let fit = match video.resolution {
            Some(res) => cover_fit(res.width, res.height, self.output.width, self.output.height),
            None => VideoFit::CoverAuto,
        };
        let video_input = VideoInput {
            path: video.local_path.clone(),
            source_duration: video.duration,
            loop_source: video.duration < duration,
            fit,
        };

        let music = music.map(|m| MusicInput {
            path: m.local_path.clone(),
            source_duration: m.duration,
            mode: if m.duration < duration {
                MusicMode::Loop
            } else {
                MusicMode::Trim
            },
        });

        let events: Vec<CaptionEvent> = captions
            .iter()
            .filter_map(|e| e.truncated(duration))
            .collect();

        let mix_levels = MixLevels {
            narration_gain: 1.0,
            music_gain: self.music_gain,
        };

        let filter_graph = filter_graph(
            &video_input.fit,
            &self.output,
            &target.subtitle_path,
            &mix_levels,
            music.is_some(),
            duration,
        );

        AssemblyPlan {
            video_input,
            audio_inputs: AudioInputs {
                narration: narration.audio_ref.clone(),
                music,
            },
            subtitle_track: SubtitleTrack {
                path: target.subtitle_path.clone(),
                style: self.style.clone(),
                events,
            },
            output_spec: self.output.clone(),
            mix_levels,
            duration,
            truncated,
            filter_graph,
            output_path: target.output_path.clone(),
        }
    }
}

fn ceil_div(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

fn round_up_even(v: u64) -> u64 {
    v + (v % 2)
}

/// Scale so the source covers `width x height`, then centre-crop the excess.
fn cover_fit(src_w: u32, src_h: u32, width: u32, height: u32) -> VideoFit {
    if src_w == 0 || src_h == 0 {
        return VideoFit::CoverAuto;
    }
    let (sw, sh, w, h) = (
        u64::from(src_w),
        u64::from(src_h),
        u64::from(width),
        u64::from(height),
    );
    // Compare aspect ratios without floats: sw/sh >= w/h.
    let (scale_w, scale_h) = if sw * h >= sh * w {
        (round_up_even(ceil_div(sw * h, sh)).max(w), h)
    } else {
        (w, round_up_even(ceil_div(sh * w, sw)).max(h))
    };
    VideoFit::Exact {
        scale_width: scale_w as u32,
        scale_height: scale_h as u32,
        crop_x: ((scale_w - w) / 2) as u32,
        crop_y: ((scale_h - h) / 2) as u32,
    }
}

/// Escape a path for use inside a quoted ffmpeg filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

fn filter_graph(
    fit: &VideoFit,
    out: &OutputSpec,
    subtitles: &Path,
    mix: &MixLevels,
    has_music: bool,
    duration: f64,
) -> String {
    let (w, h) = (out.width, out.height);
    let mut graph = String::from("[0:v]");
    match fit {
        VideoFit::Exact {
            scale_width,
            scale_height,
            crop_x,
            crop_y,
        } => {
            let _ = write!(graph, "scale={scale_width}:{scale_height},crop={w}:{h}:{crop_x}:{crop_y}");
        }
        VideoFit::CoverAuto => {
            let _ = write!(graph, "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}");
        }
    }
    let _ = write!(
        graph,
        ",setsar=1,fps={fps},ass='{subs}',trim=duration={duration:.3},setpts=PTS-STARTPTS[v];",
        fps = out.fps,
        subs = escape_filter_path(subtitles),
    );

    let _ = write!(graph, "[1:a]volume={:.3}[narr];", mix.narration_gain);
    if has_music {
        let _ = write!(
            graph,
            "[2:a]volume={:.3}[mus];[narr][mus]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[mixed];[mixed]",
            mix.music_gain
        );
    } else {
        graph.push_str("[narr]");
    }
    let _ = write!(graph, "atrim=duration={duration:.3},asetpts=PTS-STARTPTS[a]");
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HighlightSpan, Resolution, WordTimestamp};

    fn video(res: Option<(u32, u32)>, duration: f64) -> VisualAsset {
        VisualAsset {
            id: "v1".into(),
            provider: "pexels".into(),
            local_path: PathBuf::from("/jobs/j1/assets/video.mp4"),
            duration,
            resolution: res.map(|(w, h)| Resolution::new(w, h)),
            match_score: 2,
        }
    }

    fn narration(duration: f64) -> NarrationResult {
        NarrationResult {
            audio_ref: PathBuf::from("/jobs/j1/narration.wav"),
            sample_rate: 22_050,
            duration_seconds: duration,
            word_timestamps: vec![WordTimestamp::new("hi", 0.0, duration)],
        }
    }

    fn music(duration: f64) -> MusicAsset {
        MusicAsset {
            id: "calm".into(),
            provider: "local".into(),
            local_path: PathBuf::from("/music/calm.mp3"),
            duration,
        }
    }

    fn event(start: f64, end: f64) -> CaptionEvent {
        CaptionEvent {
            text: "word".into(),
            start,
            end,
            highlights: vec![HighlightSpan {
                word_index: 0,
                char_start: 0,
                char_end: 4,
                start,
                end,
            }],
        }
    }

    fn target() -> RenderTarget {
        RenderTarget {
            output_path: PathBuf::from("/jobs/j1/final.mp4"),
            subtitle_path: PathBuf::from("C:\\jobs\\j1\\captions.ass"),
        }
    }

    fn planner() -> AssemblyPlanner {
        AssemblyPlanner::new(OutputSpec::default(), 0.2, SubtitleStyle::default())
    }

    #[test]
    fn test_landscape_source_is_centre_cropped() {
        let fit = cover_fit(1920, 1080, 1080, 1920);
        assert_eq!(
            fit,
            VideoFit::Exact {
                scale_width: 3414,
                scale_height: 1920,
                crop_x: 1167,
                crop_y: 0,
            }
        );
    }

    #[test]
    fn test_narrow_source_is_scaled_to_width() {
        let fit = cover_fit(720, 1600, 1080, 1920);
        match fit {
            VideoFit::Exact {
                scale_width,
                scale_height,
                crop_x,
                crop_y,
            } => {
                assert_eq!(scale_width, 1080);
                assert_eq!(scale_height, 2400);
                assert_eq!(crop_x, 0);
                assert_eq!(crop_y, 240);
            }
            VideoFit::CoverAuto => panic!("expected exact fit"),
        }
        assert_eq!(cover_fit(0, 10, 1080, 1920), VideoFit::CoverAuto);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let captions = vec![event(0.0, 1.0), event(1.0, 2.0)];
        let a = planner().plan(&video(Some((1920, 1080)), 8.0), &narration(6.0), Some(&music(30.0)), &captions, &target());
        let b = planner().plan(&video(Some((1920, 1080)), 8.0), &narration(6.0), Some(&music(30.0)), &captions, &target());
        assert_eq!(a, b);
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert_eq!(a.digest().unwrap().len(), 64);
    }

    #[test]
    fn test_mix_levels_and_loop_decisions() {
        let plan = planner().plan(&video(None, 4.0), &narration(6.0), Some(&music(3.0)), &[], &target());
        assert_eq!(plan.mix_levels.narration_gain, 1.0);
        assert_eq!(plan.mix_levels.music_gain, 0.2);
        assert!(plan.video_input.loop_source);
        assert_eq!(plan.video_input.fit, VideoFit::CoverAuto);
        assert_eq!(plan.audio_inputs.music.as_ref().unwrap().mode, MusicMode::Loop);
        assert!(plan.filter_graph.contains("force_original_aspect_ratio=increase"));
        assert!(plan.filter_graph.contains("[2:a]volume=0.200"));
        // amix must not rescale inputs, or narration drops below unity.
        assert!(plan.filter_graph.contains("[1:a]volume=1.000[narr]"));
        assert!(plan.filter_graph.contains("amix=inputs=2:duration=first:dropout_transition=0:normalize=0[mixed]"));

        let plan = planner().plan(&video(None, 40.0), &narration(6.0), Some(&music(90.0)), &[], &target());
        assert!(!plan.video_input.loop_source);
        assert_eq!(plan.audio_inputs.music.as_ref().unwrap().mode, MusicMode::Trim);
    }

    #[test]
    fn test_no_music_graph() {
        let plan = planner().plan(&video(None, 40.0), &narration(6.0), None, &[], &target());
        assert!(plan.audio_inputs.music.is_none());
        assert!(!plan.filter_graph.contains("[2:a]"));
        assert!(plan.filter_graph.ends_with("[narr]atrim=duration=6.000,asetpts=PTS-STARTPTS[a]"));
    }

    #[test]
    fn test_duration_cap_truncates_every_stream_together() {
        let captions = vec![event(58.0, 59.5), event(59.5, 61.0), event(61.0, 63.0)];
        let plan = planner().plan(&video(None, 20.0), &narration(70.0), Some(&music(200.0)), &captions, &target());
        assert!(plan.truncated);
        assert_eq!(plan.duration, 60.0);
        assert_eq!(plan.subtitle_track.events.len(), 2);
        assert_eq!(plan.subtitle_track.events[1].end, 60.0);
        assert!(plan.filter_graph.contains("trim=duration=60.000,setpts"));
        assert!(plan.filter_graph.contains("atrim=duration=60.000"));
    }

    #[test]
    fn test_subtitle_path_is_escaped() {
        let plan = planner().plan(&video(None, 20.0), &narration(5.0), None, &[], &target());
        assert!(plan.filter_graph.contains("ass='C\\:/jobs/j1/captions.ass'"));
        assert!(plan.subtitle_document().contains("PlayResY: 1920"));
    }
}
