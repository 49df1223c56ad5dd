//! Error types for the fallback chain.

use crate::domain::ProviderError;

/// The final failure of one provider after its retries were spent.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider: String,
    /// Calls made to this provider (1 = no retries used).
    pub attempts: u32,
    pub error: ProviderError,
}

/// Errors produced by the fallback layer.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("no {label} providers configured")]
    NoProviders { label: String },

    #[error("all {label} providers failed: {}", summarize(.failures))]
    Exhausted {
        label: String,
        failures: Vec<ProviderFailure>,
    },

    #[error("{label} provider index {index} out of range")]
    UnknownProvider { label: String, index: usize },
}

impl FallbackError {
    /// Per-provider failures in the order the providers were tried.
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            Self::Exhausted { failures, .. } => failures,
            _ => &[],
        }
    }

    /// Returns `true` if any provider failed transiently.
    pub fn any_transient(&self) -> bool {
        self.failures().iter().any(|f| f.error.is_transient())
    }

    pub fn last_error(&self) -> Option<&ProviderError> {
        self.failures().last().map(|f| &f.error)
    }
}

fn summarize(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} after {} attempt(s): {}", f.provider, f.attempts, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for fallback operations.
pub type FallbackResult<T> = std::result::Result<T, FallbackError>;
