//! Narration through a local text-to-speech command.
//!
//! The command writes a WAV file; its length comes from the WAV header and
//! word timings are interpolated at a fixed rate over that length.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use factreel_core::domain::{NarrationResult, ProviderError, Script};
use factreel_core::providers::{NarrationProvider, Provider, ProviderResult};
use factreel_core::timing::interpolate_word_timestamps;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command::{self, CommandSpec};

pub const NARRATION_FILE: &str = "narration.wav";

/// Accepted range for voice speed and pitch multipliers.
const VOICE_FACTOR_RANGE: std::ops::RangeInclusive<f64> = 0.5..=2.0;

/// A speaking style: an engine voice plus speed and pitch relative to the
/// engine's base rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceProfile {
    /// Engine voice name, passed as `{voice}`.
    pub voice: String,
    #[serde(default = "unit")]
    pub speed: f64,
    #[serde(default = "unit")]
    pub pitch: f64,
}

fn unit() -> f64 {
    1.0
}

impl VoiceProfile {
    fn new(voice: &str, speed: f64, pitch: f64) -> Self {
        Self {
            voice: voice.to_string(),
            speed,
            pitch,
        }
    }
}

/// Engine arguments for one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceArgs {
    pub id: String,
    pub voice: String,
    pub words_per_minute: u32,
    pub pitch: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsSettings {
    /// Placeholders: `{text}`, `{output}`, `{voice}`, `{speed}` (words per
    /// minute) and `{pitch}` (0-99).
    pub command: CommandSpec,
    pub version_flag: String,
    /// Speaking rate of a profile with `speed = 1.0`.
    pub words_per_minute: u32,
    /// Engine pitch of a profile with `pitch = 1.0`.
    pub base_pitch: u32,
    /// Profile used for categories without an entry in `categories`.
    pub default_voice: String,
    pub voices: BTreeMap<String, VoiceProfile>,
    /// Fact category to profile name.
    pub categories: BTreeMap<String, String>,
}

impl Default for TtsSettings {
    fn default() -> Self {
        let voices = [
            ("default", VoiceProfile::new("en-us", 1.0, 1.0)),
            ("energetic", VoiceProfile::new("en-us+f3", 1.1, 1.05)),
            ("calm", VoiceProfile::new("en-us+m3", 0.95, 1.0)),
            ("authoritative", VoiceProfile::new("en-gb", 1.0, 0.95)),
        ];
        let categories = [
            ("fact", "authoritative"),
            ("general", "authoritative"),
            ("story", "energetic"),
            ("entertainment", "energetic"),
            ("tutorial", "calm"),
            ("education", "default"),
        ];
        Self {
            command: CommandSpec::new(
                "espeak-ng",
                &["-v", "{voice}", "-s", "{speed}", "-p", "{pitch}", "-w", "{output}", "{text}"],
            ),
            version_flag: "--version".to_string(),
            words_per_minute: 165,
            base_pitch: 50,
            default_voice: "default".to_string(),
            voices: voices
                .into_iter()
                .map(|(id, profile)| (id.to_string(), profile))
                .collect(),
            categories: categories
                .into_iter()
                .map(|(category, voice)| (category.to_string(), voice.to_string()))
                .collect(),
        }
    }
}

impl TtsSettings {
    /// Check that every referenced profile exists and every factor is in range.
    pub fn validate(&self) -> Result<(), String> {
        if !self.voices.contains_key(&self.default_voice) {
            return Err(format!("default voice {:?} is not defined", self.default_voice));
        }
        for (category, voice) in &self.categories {
            if !self.voices.contains_key(voice) {
                return Err(format!("category {category:?} maps to undefined voice {voice:?}"));
            }
        }
        for (id, profile) in &self.voices {
            if !VOICE_FACTOR_RANGE.contains(&profile.speed) || !VOICE_FACTOR_RANGE.contains(&profile.pitch) {
                return Err(format!("voice {id:?}: speed and pitch must be within 0.5..=2.0"));
            }
        }
        if self.words_per_minute == 0 {
            return Err("words_per_minute must be positive".to_string());
        }
        Ok(())
    }

    /// The profile for a fact category. Unmapped categories and dangling
    /// profile names fall back to `default_voice`.
    pub fn voice_for(&self, category: &str) -> ProviderResult<VoiceArgs> {
        let category = category.trim().to_lowercase();
        let wanted = self
            .categories
            .get(&category)
            .unwrap_or(&self.default_voice);
        let (id, profile) = match self.voices.get_key_value(wanted) {
            Some(found) => found,
            None => {
                warn!(voice = %wanted, "voice not defined, using the default voice");
                self.voices.get_key_value(&self.default_voice).ok_or_else(|| {
                    ProviderError::permanent(format!(
                        "default voice {:?} is not defined",
                        self.default_voice
                    ))
                })?
            }
        };
        let pitch = (f64::from(self.base_pitch) * profile.pitch).round().clamp(0.0, 99.0);
        let words_per_minute = (f64::from(self.words_per_minute) * profile.speed).round().max(1.0);
        Ok(VoiceArgs {
            id: id.clone(),
            voice: profile.voice.clone(),
            words_per_minute: words_per_minute as u32,
            pitch: pitch as u32,
        })
    }
}

/// Sample rate and length of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub duration_secs: f64,
}

/// Read the header of a WAV file.
pub fn wav_info(path: &Path) -> Result<WavInfo, hound::Error> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let frames = reader.duration();
    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        duration_secs: if spec.sample_rate == 0 {
            0.0
        } else {
            f64::from(frames) / f64::from(spec.sample_rate)
        },
    })
}

/// Blocking-safe [`wav_info`] for async callers.
pub async fn wav_info_async(path: PathBuf) -> ProviderResult<WavInfo> {
    let shown = path.display().to_string();
    tokio::task::spawn_blocking(move || wav_info(&path))
        .await
        .map_err(|e| ProviderError::transient(format!("wav probe task failed: {e}")))?
        .map_err(|e| ProviderError::permanent(format!("unreadable WAV {shown}: {e}")))
}

/// Speech synthesis by an external command such as `espeak-ng` or `piper`.
pub struct CommandNarrator {
    settings: TtsSettings,
}

impl CommandNarrator {
    pub fn new(settings: TtsSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Provider for CommandNarrator {
    fn name(&self) -> &str {
        "command"
    }

    async fn probe(&self) -> ProviderResult<()> {
        command::probe(&self.settings.command.program, &self.settings.version_flag).await
    }
}

#[async_trait]
impl NarrationProvider for CommandNarrator {
    async fn synthesize(&self, script: &Script, out_dir: &Path) -> ProviderResult<NarrationResult> {
        let text = script.narration_text();
        let output = out_dir.join(NARRATION_FILE);
        let output_str = output.to_string_lossy();
        let voice = self.settings.voice_for(&script.category)?;
        let speed = voice.words_per_minute.to_string();
        let pitch = voice.pitch.to_string();
        let args = self.settings.command.expand(&[
            ("text", text),
            ("output", output_str.as_ref()),
            ("voice", voice.voice.as_str()),
            ("speed", speed.as_str()),
            ("pitch", pitch.as_str()),
        ]);
        command::run_checked(&self.settings.command.program, &args).await?;

        let info = wav_info_async(output.clone()).await?;
        if !(info.duration_secs > 0.0) {
            return Err(ProviderError::permanent(format!(
                "{} produced silent audio",
                self.settings.command.program
            )));
        }
        info!(
            provider = "command",
            voice = %voice.id,
            duration_secs = info.duration_secs,
            sample_rate = info.sample_rate,
            "narration synthesized"
        );
        Ok(NarrationResult {
            audio_ref: output,
            sample_rate: info.sample_rate,
            duration_seconds: info.duration_secs,
            word_timestamps: interpolate_word_timestamps(text, info.duration_secs),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Write `secs` of silence as 16-bit mono WAV.
    pub(crate) fn write_silent_wav(path: &Path, sample_rate: u32, secs: f64) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let samples = (f64::from(sample_rate) * secs) as usize;
        for _ in 0..samples {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_category_picks_voice_profile() {
        let settings = TtsSettings::default();

        let story = settings.voice_for("Story").unwrap();
        assert_eq!(story.id, "energetic");
        assert_eq!(story.voice, "en-us+f3");
        assert_eq!(story.words_per_minute, 182);
        assert_eq!(story.pitch, 53);

        let fact = settings.voice_for("general").unwrap();
        assert_eq!(fact.id, "authoritative");
        assert_eq!(fact.words_per_minute, 165);
        assert_eq!(fact.pitch, 48);

        let calm = settings.voice_for("tutorial").unwrap();
        assert_eq!(calm.words_per_minute, 157);

        let unknown = settings.voice_for("animals").unwrap();
        assert_eq!(unknown.id, "default");
        assert_eq!(unknown.words_per_minute, 165);
        assert_eq!(unknown.pitch, 50);
    }

    #[test]
    fn test_dangling_voice_falls_back_to_default() {
        let mut settings = TtsSettings::default();
        settings.categories.insert("story".into(), "whisper".into());
        assert!(settings.validate().is_err());
        assert_eq!(settings.voice_for("story").unwrap().id, "default");

        settings.default_voice = "missing".into();
        assert!(!settings.voice_for("story").unwrap_err().is_transient());
    }

    #[test]
    fn test_validate_rejects_out_of_range_profiles() {
        assert!(TtsSettings::default().validate().is_ok());
        let mut settings = TtsSettings::default();
        settings
            .voices
            .insert("chipmunk".into(), VoiceProfile::new("en-us", 2.5, 1.0));
        assert!(settings.validate().unwrap_err().contains("chipmunk"));
    }

    #[test]
    fn test_wav_info_reads_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_silent_wav(&path, 16_000, 1.5);
        let info = wav_info(&path).unwrap();
        assert_eq!(info.sample_rate, 16_000);
        assert!((info.duration_secs - 1.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_non_wav_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"definitely not riff").unwrap();
        let err = wav_info_async(path).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_failing_command_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let narrator = CommandNarrator::new(TtsSettings {
            command: CommandSpec::new("factreel-missing-tts", &["{output}"]),
            ..TtsSettings::default()
        });
        let script = Script::from_fact(&factreel_core::domain::Fact::new(
            "Sharks predate trees.",
            "nature",
            "f-1",
        ));
        let err = narrator.synthesize(&script, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("factreel-missing-tts"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_output_becomes_timed_narration() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.wav");
        write_silent_wav(&source, 22_050, 2.0);
        // `cp` stands in for a TTS engine that writes the requested file.
        let narrator = CommandNarrator::new(TtsSettings {
            command: CommandSpec::new("cp", &[source.to_str().unwrap(), "{output}"]),
            ..TtsSettings::default()
        });
        let script = Script::from_fact(&factreel_core::domain::Fact::new(
            "Sharks existed before trees did.",
            "nature",
            "f-1",
        ));

        let narration = narrator.synthesize(&script, dir.path()).await.unwrap();

        assert_eq!(narration.audio_ref, dir.path().join(NARRATION_FILE));
        assert_eq!(narration.sample_rate, 22_050);
        assert!((narration.duration_seconds - 2.0).abs() < 1e-6);
        assert_eq!(narration.word_count(), 5);
        assert!(narration
            .word_timestamps
            .iter()
            .all(|w| w.end <= narration.duration_seconds));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_voice_arguments_reach_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.wav");
        write_silent_wav(&source, 16_000, 1.0);
        let args_file = dir.path().join("args.txt");
        let narrator = CommandNarrator::new(TtsSettings {
            command: CommandSpec::new(
                "sh",
                &[
                    "-c",
                    "printf '%s %s %s' \"$1\" \"$2\" \"$3\" > \"$4\" && cp \"$5\" \"$6\"",
                    "tts",
                    "{voice}",
                    "{speed}",
                    "{pitch}",
                    args_file.to_str().unwrap(),
                    source.to_str().unwrap(),
                    "{output}",
                ],
            ),
            ..TtsSettings::default()
        });
        let script = Script::from_fact(&factreel_core::domain::Fact::new(
            "Once upon a time sharks swam.",
            "story",
            "f-2",
        ));

        narrator.synthesize(&script, dir.path()).await.unwrap();

        let recorded = std::fs::read_to_string(&args_file).unwrap();
        assert_eq!(recorded, "en-us+f3 182 53");
    }
}
