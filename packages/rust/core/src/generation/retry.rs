//! Exponential-backoff retry around any [`GenerationService`].

use std::time::Duration;

use async_trait::async_trait;
use sidequest_shared::{GenerationConfig, Result};
use tracing::warn;

use super::{GenerationRequest, GenerationService};

/// Retries retryable failures (rate limits, network, timeouts). `max_attempts`
/// counts the first call; the delay before attempt `n + 1` is
/// `base_delay * 2^n`.
pub struct RetryingGeneration<G> {
    inner: G,
    max_attempts: u32,
    base_delay: Duration,
}

impl<G: GenerationService> RetryingGeneration<G> {
    pub fn new(inner: G, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(inner: G, config: &GenerationConfig) -> Self {
        Self::new(
            inner,
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
        )
    }
}

#[async_trait]
impl<G: GenerationService> GenerationService for RetryingGeneration<G> {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(request.clone()).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt);
                    warn!(
                        stage = %request.stage,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use sidequest_shared::SidequestError;

    use super::*;
    use crate::generation::ModelParams;
    use crate::trace::StageId;

    /// Fails with the given error kind for the first `failures` calls.
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        rate_limited: bool,
    }

    impl Flaky {
        fn new(failures: u32, rate_limited: bool) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                rate_limited,
            }
        }
    }

    #[async_trait]
    impl GenerationService for Flaky {
        async fn generate(&self, _request: GenerationRequest) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                if self.rate_limited {
                    return Err(SidequestError::RateLimited("slow down".into()));
                }
                return Err(SidequestError::parse("bad output"));
            }
            Ok("{}".into())
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            stage: StageId::Discovery,
            system_prompt: String::new(),
            payload: serde_json::Value::Null,
            params: ModelParams::for_stage(StageId::Discovery),
        }
    }

    #[tokio::test]
    async fn retries_rate_limits_until_success() {
        let retrying = RetryingGeneration::new(Flaky::new(2, true), 3, Duration::from_millis(1));
        assert_eq!(retrying.generate(request()).await.unwrap(), "{}");
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let retrying = RetryingGeneration::new(Flaky::new(10, true), 3, Duration::from_millis(1));
        let err = retrying.generate(request()).await.unwrap_err();
        assert!(matches!(err, SidequestError::RateLimited(_)));
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_fast() {
        let retrying = RetryingGeneration::new(Flaky::new(1, false), 3, Duration::from_millis(1));
        let err = retrying.generate(request()).await.unwrap_err();
        assert!(matches!(err, SidequestError::Parse { .. }));
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 1);
    }
}
