//! Stock footage search and download: Pexels and Pixabay.
//!
//! Both APIs are queried once per keyword and the hits pooled; the core
//! ranker dedups and orders the pool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use factreel_core::domain::{ProviderError, Resolution, VideoCandidate};
use factreel_core::providers::{Provider, ProviderResult, VideoAssetProvider};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http::{classify_error, download, read_json};

pub const PEXELS_URL: &str = "https://api.pexels.com/videos/search";
pub const PIXABAY_URL: &str = "https://pixabay.com/api/videos/";

/// Run one search per keyword and pool the hits in keyword order.
///
/// Fails only when every query failed.
async fn search_each<F, Fut>(provider: &str, keywords: &[String], query: F) -> ProviderResult<Vec<VideoCandidate>>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = ProviderResult<Vec<VideoCandidate>>>,
{
    let mut pool = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0usize;
    for keyword in keywords {
        match query(keyword.clone()).await {
            Ok(found) => {
                debug!(provider = %provider, keyword = %keyword, hits = found.len(), "video search");
                succeeded += 1;
                pool.extend(found);
            }
            Err(e) => {
                warn!(provider = %provider, keyword = %keyword, error = %e, "video search failed");
                last_error = Some(e);
            }
        }
    }
    match last_error {
        Some(err) if succeeded == 0 => Err(err),
        _ => Ok(pool),
    }
}

fn candidate_path(out_dir: &Path, candidate: &VideoCandidate) -> PathBuf {
    let id: String = candidate
        .id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    out_dir.join(format!("{}_{}.mp4", candidate.provider, id))
}

// ---------------------------------------------------------------------------
// Pexels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PexelsSettings {
    pub url: String,
    pub orientation: String,
    pub size: String,
    pub per_page: u32,
}

impl Default for PexelsSettings {
    fn default() -> Self {
        Self {
            url: PEXELS_URL.to_string(),
            orientation: "portrait".to_string(),
            size: "large".to_string(),
            per_page: 15,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

#[derive(Debug, Deserialize)]
struct PexelsVideo {
    id: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    video_files: Vec<PexelsFile>,
}

#[derive(Debug, Deserialize)]
struct PexelsFile {
    link: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Pexels pages look like `https://www.pexels.com/video/octopus-on-coral-123/`;
/// the slug is the only title the API gives.
fn pexels_title(page_url: &str) -> String {
    let slug = page_url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    slug.split('-')
        .filter(|part| !part.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn pexels_candidates(response: PexelsResponse) -> Vec<VideoCandidate> {
    response
        .videos
        .into_iter()
        .filter_map(|video| {
            // Widest portrait rendition.
            let best = video
                .video_files
                .iter()
                .filter_map(|f| match (f.width, f.height) {
                    (Some(w), Some(h)) if w < h => Some((f, w, h)),
                    _ => None,
                })
                .max_by_key(|(_, w, _)| *w)?;
            let (file, width, height) = best;
            let title = pexels_title(&video.url);
            Some(VideoCandidate {
                id: video.id.to_string(),
                provider: "pexels".to_string(),
                tags: title.split_whitespace().map(str::to_string).collect(),
                title,
                duration: video.duration,
                resolution: Some(Resolution::new(width, height)),
                download_url: file.link.clone(),
            })
        })
        .collect()
}

pub struct PexelsVideos {
    client: reqwest::Client,
    settings: PexelsSettings,
    api_key: String,
}

impl PexelsVideos {
    pub fn new(client: reqwest::Client, settings: PexelsSettings, api_key: String) -> Self {
        Self {
            client,
            settings,
            api_key,
        }
    }

    async fn query(&self, keyword: &str, per_page: u32) -> ProviderResult<Vec<VideoCandidate>> {
        let per_page = per_page.to_string();
        let response = self
            .client
            .get(&self.settings.url)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", keyword),
                ("orientation", self.settings.orientation.as_str()),
                ("size", self.settings.size.as_str()),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_error(&e))?;
        let body: PexelsResponse = read_json(response).await?;
        Ok(pexels_candidates(body))
    }
}

#[async_trait]
impl Provider for PexelsVideos {
    fn name(&self) -> &str {
        "pexels"
    }

    async fn probe(&self) -> ProviderResult<()> {
        self.query("nature", 1).await.map(|_| ())
    }
}

#[async_trait]
impl VideoAssetProvider for PexelsVideos {
    async fn search(&self, keywords: &[String]) -> ProviderResult<Vec<VideoCandidate>> {
        search_each("pexels", keywords, |kw| async move {
            self.query(&kw, self.settings.per_page).await
        })
        .await
    }

    async fn download(&self, candidate: &VideoCandidate, out_dir: &Path) -> ProviderResult<PathBuf> {
        download(&self.client, &candidate.download_url, &candidate_path(out_dir, candidate)).await
    }
}

// ---------------------------------------------------------------------------
// Pixabay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PixabaySettings {
    pub url: String,
    pub video_type: String,
    pub per_page: u32,
}

impl Default for PixabaySettings {
    fn default() -> Self {
        Self {
            url: PIXABAY_URL.to_string(),
            video_type: "film".to_string(),
            per_page: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PixabayResponse {
    #[serde(default)]
    hits: Vec<PixabayHit>,
}

#[derive(Debug, Deserialize)]
struct PixabayHit {
    id: u64,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    videos: PixabayRenditions,
}

#[derive(Debug, Default, Deserialize)]
struct PixabayRenditions {
    large: Option<PixabayFile>,
    medium: Option<PixabayFile>,
    small: Option<PixabayFile>,
}

#[derive(Debug, Deserialize)]
struct PixabayFile {
    #[serde(default)]
    url: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

fn pixabay_candidates(response: PixabayResponse) -> Vec<VideoCandidate> {
    response
        .hits
        .into_iter()
        .filter_map(|hit| {
            // Medium first: good enough quality, much smaller download.
            let file = [&hit.videos.medium, &hit.videos.large, &hit.videos.small]
                .into_iter()
                .flatten()
                .find(|f| !f.url.is_empty())?;
            let resolution =
                (file.width > 0 && file.height > 0).then(|| Resolution::new(file.width, file.height));
            let tags: Vec<String> = hit
                .tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            Some(VideoCandidate {
                id: hit.id.to_string(),
                provider: "pixabay".to_string(),
                title: tags.join(" "),
                tags,
                duration: hit.duration,
                resolution,
                download_url: file.url.clone(),
            })
        })
        .collect()
}

pub struct PixabayVideos {
    client: reqwest::Client,
    settings: PixabaySettings,
    api_key: String,
}

impl PixabayVideos {
    pub fn new(client: reqwest::Client, settings: PixabaySettings, api_key: String) -> Self {
        Self {
            client,
            settings,
            api_key,
        }
    }

    async fn query(&self, keyword: &str, per_page: u32) -> ProviderResult<Vec<VideoCandidate>> {
        // Pixabay rejects per_page below 3.
        let per_page = per_page.max(3).to_string();
        let response = self
            .client
            .get(&self.settings.url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", keyword),
                ("video_type", self.settings.video_type.as_str()),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_error(&e))?;
        let body: PixabayResponse = read_json(response).await?;
        Ok(pixabay_candidates(body))
    }
}

#[async_trait]
impl Provider for PixabayVideos {
    fn name(&self) -> &str {
        "pixabay"
    }

    async fn probe(&self) -> ProviderResult<()> {
        self.query("nature", 3).await.map(|_| ())
    }
}

#[async_trait]
impl VideoAssetProvider for PixabayVideos {
    async fn search(&self, keywords: &[String]) -> ProviderResult<Vec<VideoCandidate>> {
        search_each("pixabay", keywords, |kw| async move {
            self.query(&kw, self.settings.per_page).await
        })
        .await
    }

    async fn download(&self, candidate: &VideoCandidate, out_dir: &Path) -> ProviderResult<PathBuf> {
        if candidate.download_url.is_empty() {
            return Err(ProviderError::permanent(format!(
                "pixabay candidate {} has no download url",
                candidate.id
            )));
        }
        download(&self.client, &candidate.download_url, &candidate_path(out_dir, candidate)).await
    }
}
