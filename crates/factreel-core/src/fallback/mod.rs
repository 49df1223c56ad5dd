//! Provider fallback chain: ordered retry-then-substitute execution.
//!
//! Every stage that talks to an external capability goes through a
//! [`ProviderChain`]. The chain tries providers strictly in declaration order,
//! retries transient failures with exponential backoff and moves on after a
//! permanent failure or an exhausted retry budget.
//!
//! # Modules
//!
//! - [`policy`]: `RetryPolicy` (retries, backoff, per-call timeout)
//! - [`chain`]: `ProviderChain` with `execute`, `execute_on` and `gather`
//! - [`error`]: `FallbackError` / `ProviderFailure`

pub mod chain;
pub mod error;
pub mod policy;

pub use chain::{ChainSuccess, ProviderChain};
pub use error::{FallbackError, FallbackResult, ProviderFailure};
pub use policy::RetryPolicy;
