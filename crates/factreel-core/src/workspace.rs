//! Job-scoped artifact directories under the shared storage root.
//!
//! Every job writes only below `<storage_root>/<job-id>/`, so concurrent jobs
//! never collide.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::JobId;
use crate::planner::RenderTarget;

/// Layout of one job's artifact directory.
#[derive(Debug, Clone, PartialEq)]
pub struct JobWorkspace {
    root: PathBuf,
}

impl JobWorkspace {
    /// Compute the layout without touching the filesystem.
    pub fn new(storage_root: &Path, id: &JobId) -> Self {
        Self {
            root: storage_root.join(id.as_str()),
        }
    }

    /// Create the job directory and its subdirectories.
    pub async fn create(storage_root: &Path, id: &JobId) -> std::io::Result<Self> {
        let ws = Self::new(storage_root, id);
        tokio::fs::create_dir_all(ws.audio_dir()).await?;
        tokio::fs::create_dir_all(ws.assets_dir()).await?;
        Ok(ws)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Narration audio.
    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    /// Downloaded stock footage.
    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn captions_path(&self) -> PathBuf {
        self.root.join("captions.ass")
    }

    pub fn plan_path(&self) -> PathBuf {
        self.root.join("plan.json")
    }

    pub fn job_record_path(&self) -> PathBuf {
        self.root.join("job.json")
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.join("final.mp4")
    }

    pub fn render_target(&self) -> RenderTarget {
        RenderTarget {
            output_path: self.output_path(),
            subtitle_path: self.captions_path(),
        }
    }
}

/// Write `value` as pretty JSON.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> crate::domain::Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}
