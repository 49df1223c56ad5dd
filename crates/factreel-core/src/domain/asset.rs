//! Stock media: search candidates and selected assets.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Native frame size of a video.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A search hit from a video provider, not yet downloaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoCandidate {
    /// Provider-scoped identifier.
    pub id: String,
    /// Name of the provider that returned this candidate.
    pub provider: String,
    pub title: String,
    pub tags: Vec<String>,
    /// Clip length in seconds.
    pub duration: f64,
    pub resolution: Option<Resolution>,
    pub download_url: String,
}

/// A downloaded background video chosen for a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualAsset {
    pub id: String,
    pub provider: String,
    pub local_path: PathBuf,
    pub duration: f64,
    pub resolution: Option<Resolution>,
    /// Number of keywords the candidate matched.
    pub match_score: u32,
}

impl VisualAsset {
    pub fn from_candidate(candidate: &VideoCandidate, local_path: PathBuf, match_score: u32) -> Self {
        Self {
            id: candidate.id.clone(),
            provider: candidate.provider.clone(),
            local_path,
            duration: candidate.duration,
            resolution: candidate.resolution,
            match_score,
        }
    }
}

/// A background music track from the local pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MusicAsset {
    pub id: String,
    pub provider: String,
    pub local_path: PathBuf,
    /// Track length in seconds.
    pub duration: f64,
}

/// Output of the asset selection stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectedAssets {
    pub keywords: Vec<String>,
    pub video: VisualAsset,
    pub music: Option<MusicAsset>,
}
