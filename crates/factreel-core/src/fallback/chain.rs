//! Ordered provider chain with per-provider retry, timeout and backoff.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use super::error::{FallbackError, FallbackResult, ProviderFailure};
use super::policy::RetryPolicy;
use crate::domain::ProviderError;
use crate::metrics::METRICS;
use crate::obs;
use crate::providers::Provider;

/// A successful chain call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSuccess<T> {
    pub value: T,
    /// Name of the provider that produced `value`.
    pub provider: String,
    /// Position of that provider in the chain.
    pub provider_index: usize,
    /// Calls made to the winning provider (1 = first try).
    pub attempts: u32,
}

/// An ordered list of interchangeable providers for one capability.
///
/// `P` is usually a capability trait object such as `dyn FactProvider`.
pub struct ProviderChain<P: ?Sized> {
    label: String,
    providers: Vec<Arc<P>>,
    policy: RetryPolicy,
}

impl<P: ?Sized> Clone for ProviderChain<P> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            providers: self.providers.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<P: ?Sized + Provider> ProviderChain<P> {
    pub fn new(label: impl Into<String>, providers: Vec<Arc<P>>, policy: RetryPolicy) -> Self {
        Self {
            label: label.into(),
            providers,
            policy,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Provider names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Run `op` against each provider in order until one succeeds.
    ///
    /// Transient failures are retried on the same provider up to the policy's
    /// retry budget. A permanent failure or an exhausted budget moves to the
    /// next provider. Later providers are never called once one succeeds.
    pub async fn execute<T, F, Fut>(&self, op: F) -> FallbackResult<ChainSuccess<T>>
    where
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        if self.providers.is_empty() {
            return Err(FallbackError::NoProviders {
                label: self.label.clone(),
            });
        }

        let mut failures = Vec::new();
        for (index, provider) in self.providers.iter().enumerate() {
            match self.call_with_retries(provider, &op).await {
                Ok((value, attempts)) => {
                    debug!(
                        chain = %self.label,
                        provider = %provider.name(),
                        attempts,
                        "provider call succeeded"
                    );
                    return Ok(ChainSuccess {
                        value,
                        provider: provider.name().to_string(),
                        provider_index: index,
                        attempts,
                    });
                }
                Err(failure) => {
                    if index + 1 < self.providers.len() {
                        METRICS.inc_provider_fallbacks();
                        obs::emit_provider_fallback(
                            &self.label,
                            &failure.provider,
                            failure.attempts,
                            &failure.error,
                        );
                    }
                    failures.push(failure);
                }
            }
        }

        Err(FallbackError::Exhausted {
            label: self.label.clone(),
            failures,
        })
    }

    /// Run `op` against one provider with retries and no substitution.
    pub async fn execute_on<T, F, Fut>(
        &self,
        index: usize,
        op: F,
    ) -> FallbackResult<ChainSuccess<T>>
    where
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let provider = self
            .providers
            .get(index)
            .ok_or_else(|| FallbackError::UnknownProvider {
                label: self.label.clone(),
                index,
            })?;

        match self.call_with_retries(provider, &op).await {
            Ok((value, attempts)) => Ok(ChainSuccess {
                value,
                provider: provider.name().to_string(),
                provider_index: index,
                attempts,
            }),
            Err(failure) => Err(FallbackError::Exhausted {
                label: self.label.clone(),
                failures: vec![failure],
            }),
        }
    }

    /// Run `op` against every provider concurrently.
    ///
    /// Each provider gets its own retry budget. Outcomes come back in
    /// declaration order regardless of completion order.
    pub async fn gather<T, F, Fut>(&self, op: F) -> Vec<Result<ChainSuccess<T>, ProviderFailure>>
    where
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let op = &op;
        let calls = self
            .providers
            .iter()
            .enumerate()
            .map(|(index, provider)| async move {
                self.call_with_retries(provider, op)
                    .await
                    .map(|(value, attempts)| ChainSuccess {
                        value,
                        provider: provider.name().to_string(),
                        provider_index: index,
                        attempts,
                    })
            });
        futures::future::join_all(calls).await
    }

    async fn call_with_retries<T, F, Fut>(
        &self,
        provider: &Arc<P>,
        op: &F,
    ) -> Result<(T, u32), ProviderFailure>
    where
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.policy.max_attempts();
        let timeout = self.policy.call_timeout();
        let mut attempt = 0;

        loop {
            attempt += 1;
            METRICS.inc_provider_calls();

            let error = match tokio::time::timeout(timeout, op(Arc::clone(provider))).await {
                Ok(Ok(value)) => return Ok((value, attempt)),
                Ok(Err(err)) => err,
                Err(_elapsed) => ProviderError::transient(format!(
                    "call timed out after {}ms",
                    self.policy.call_timeout_ms
                )),
            };

            if !error.is_transient() || attempt >= max_attempts {
                return Err(ProviderFailure {
                    provider: provider.name().to_string(),
                    attempts: attempt,
                    error,
                });
            }

            let delay = self.policy.backoff_delay(attempt);
            warn!(
                chain = %self.label,
                provider = %provider.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient provider failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
