//! Error taxonomy for the assembly pipeline.

use serde::{Deserialize, Serialize};

use super::job::Stage;

/// Failure reported by a single capability implementation.
///
/// The variant decides what the fallback chain does next: transient failures
/// are retried on the same provider, everything else advances to the next one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Network errors, timeouts, 429 and 5xx responses.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Bad credentials, other 4xx responses, malformed payloads.
    #[error("permanent provider failure: {0}")]
    Permanent(String),

    /// The external renderer ran and exited unsuccessfully.
    #[error("renderer exited with status {exit_code:?}: {stderr}")]
    RenderFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl ProviderError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Returns `true` if retrying the same provider may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Word timing that cannot be repaired.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NarrationTimingError {
    #[error("narration text has {words} words but provider returned {timestamps} timestamps")]
    CountMismatch { words: usize, timestamps: usize },

    #[error("narration duration must be positive and finite, got {0}")]
    InvalidDuration(f64),
}

/// Classification attached to every recorded job error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ProviderTransient,
    ProviderPermanent,
    NarrationTiming,
    AssetUnavailable,
    Render,
    Publish,
    Aborted,
    Config,
    Storage,
    JobBusy,
}

/// Pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("stage {stage} exhausted every provider: {detail}")]
    ProvidersExhausted {
        stage: Stage,
        /// At least one provider failed transiently, so re-running the stage may help.
        retryable: bool,
        detail: String,
    },

    #[error("narration timing error: {0}")]
    NarrationTiming(#[from] NarrationTimingError),

    #[error("no usable video asset for keywords {keywords:?}: {detail}")]
    AssetUnavailable {
        keywords: Vec<String>,
        detail: String,
    },

    #[error("render failed with exit status {exit_code:?}: {stderr}")]
    Render {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("job aborted: {0}")]
    Aborted(String),

    #[error("artifact of stage {0} is missing")]
    MissingArtifact(Stage),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("job store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Classify this error for the job record.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProvidersExhausted { retryable, .. } => {
                if *retryable {
                    ErrorKind::ProviderTransient
                } else {
                    ErrorKind::ProviderPermanent
                }
            }
            Self::NarrationTiming(_) => ErrorKind::NarrationTiming,
            Self::AssetUnavailable { .. } => ErrorKind::AssetUnavailable,
            Self::Render { .. } => ErrorKind::Render,
            Self::Publish(_) => ErrorKind::Publish,
            Self::Aborted(_) => ErrorKind::Aborted,
            Self::Config(_) => ErrorKind::Config,
            Self::Store(crate::store::StoreError::Busy { .. }) => ErrorKind::JobBusy,
            Self::MissingArtifact(_)
            | Self::Store(_)
            | Self::Serialization(_)
            | Self::Io(_) => ErrorKind::Storage,
        }
    }

    /// Returns `true` if the orchestrator may re-run the failing stage.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProvidersExhausted {
                retryable: true,
                ..
            }
        )
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
