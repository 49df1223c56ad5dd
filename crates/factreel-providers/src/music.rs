//! Background music from a local directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use factreel_core::domain::{MusicAsset, ProviderError};
use factreel_core::providers::{MusicAssetProvider, Provider, ProviderResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::command;
use crate::narration::wav_info_async;

pub const MUSIC_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MusicDirSettings {
    pub path: PathBuf,
    /// Used for the length of non-WAV tracks.
    pub ffprobe: String,
}

impl Default for MusicDirSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/music"),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

fn is_music_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MUSIC_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Length of any media file according to `ffprobe`.
pub async fn probe_duration(ffprobe: &str, path: &Path) -> ProviderResult<f64> {
    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.to_string_lossy().into_owned(),
    ];
    let output = command::run_checked(ffprobe, &args).await?;
    let text = String::from_utf8_lossy(&output.stdout);
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| ProviderError::permanent(format!("ffprobe gave no duration for {}", path.display())))
}

/// Every audio file in one directory, in file-name order.
pub struct LocalMusicDir {
    settings: MusicDirSettings,
}

impl LocalMusicDir {
    pub fn new(settings: MusicDirSettings) -> Self {
        Self { settings }
    }

    async fn track(&self, path: PathBuf) -> ProviderResult<MusicAsset> {
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        let duration = if is_wav {
            wav_info_async(path.clone()).await?.duration_secs
        } else {
            probe_duration(&self.settings.ffprobe, &path).await?
        };
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(MusicAsset {
            id,
            provider: "local_dir".to_string(),
            local_path: path,
            duration,
        })
    }
}

#[async_trait]
impl Provider for LocalMusicDir {
    fn name(&self) -> &str {
        "local_dir"
    }

    async fn probe(&self) -> ProviderResult<()> {
        if !self.settings.path.is_dir() {
            return Err(ProviderError::permanent(format!(
                "music directory {} does not exist",
                self.settings.path.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MusicAssetProvider for LocalMusicDir {
    async fn list(&self) -> ProviderResult<Vec<MusicAsset>> {
        let dir = &self.settings.path;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "music directory missing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(ProviderError::permanent(format!("reading {}: {e}", dir.display()))),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProviderError::permanent(format!("reading {}: {e}", dir.display())))?
        {
            let path = entry.path();
            if is_music_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tracks = Vec::with_capacity(paths.len());
        for path in paths {
            match self.track(path.clone()).await {
                Ok(track) => tracks.push(track),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable track"),
            }
        }
        debug!(dir = %dir.display(), tracks = tracks.len(), "music pool listed");
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::tests::write_silent_wav;

    #[test]
    fn test_extension_filter() {
        assert!(is_music_file(Path::new("a/song.MP3")));
        assert!(is_music_file(Path::new("loop.wav")));
        assert!(!is_music_file(Path::new("cover.jpg")));
        assert!(!is_music_file(Path::new("README")));
    }

    #[tokio::test]
    async fn test_lists_wav_tracks_with_durations() {
        let dir = tempfile::tempdir().unwrap();
        write_silent_wav(&dir.path().join("b_calm.wav"), 8_000, 2.0);
        write_silent_wav(&dir.path().join("a_upbeat.wav"), 8_000, 1.0);
        std::fs::write(dir.path().join("notes.txt"), "not music").unwrap();

        let music = LocalMusicDir::new(MusicDirSettings {
            path: dir.path().to_path_buf(),
            ffprobe: "factreel-missing-ffprobe".into(),
        });
        let tracks = music.list().await.unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, "a_upbeat");
        assert!((tracks[0].duration - 1.0).abs() < 1e-6);
        assert_eq!(tracks[1].id, "b_calm");
    }

    #[tokio::test]
    async fn test_unprobeable_tracks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.mp3"), b"id3").unwrap();
        let music = LocalMusicDir::new(MusicDirSettings {
            path: dir.path().to_path_buf(),
            ffprobe: "factreel-missing-ffprobe".into(),
        });
        assert!(music.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_empty_pool() {
        let dir = tempfile::tempdir().unwrap();
        let music = LocalMusicDir::new(MusicDirSettings {
            path: dir.path().join("nope"),
            ffprobe: "ffprobe".into(),
        });
        assert!(music.list().await.unwrap().is_empty());
        assert!(music.probe().await.is_err());
    }
}
