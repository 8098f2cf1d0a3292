//! Retry loop around a single-attempt [`AnalysisBackend`].

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use factlens_core::defaults::{AI_MAX_RETRIES, AI_RETRY_BASE_DELAY_MS};
use factlens_core::{AnalysisClient, AnalysisResult, Error, Result};

use crate::backend::AnalysisBackend;
use crate::parse::parse_analysis;

/// Attempt budget and backoff for analysis calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never less than one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: AI_MAX_RETRIES,
            base_delay: Duration::from_millis(AI_RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Some(n) = std::env::var("AI_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            policy = policy.with_max_attempts(n);
        }
        if let Some(ms) = std::env::var("AI_RETRY_BASE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            policy = policy.with_base_delay(Duration::from_millis(ms));
        }
        policy
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay slept after the zero-based `attempt` fails.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// [`AnalysisClient`] that prepares inputs, then calls the backend until it
/// yields a parseable document or the attempt budget runs out.
///
/// Preparation gets its own budget under the same policy. Only remote
/// failures ([`Error::Analysis`]) are retried there; unreadable local media
/// fails at once. Unparseable output counts as a failed generate attempt.
/// Once preparation succeeds, the backend's `release` runs on every exit path.
pub struct RetryingAnalyzer<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: AnalysisBackend> RetryingAnalyzer<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn prepare_with_retry(
        &self,
        audio: &Path,
        keyframes: &[PathBuf],
    ) -> Result<B::Prepared> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.backend.prepare(audio, keyframes).await {
                Ok(prepared) => return Ok(prepared),
                Err(e @ Error::Analysis(_)) if attempt + 1 < attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        model = self.backend.model_name(),
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Preparing analysis inputs failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt_all(&self, prepared: &B::Prepared) -> Result<AnalysisResult> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let start = Instant::now();
            let outcome = match self.backend.generate(prepared).await {
                Ok(text) => parse_analysis(&text),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(result) => {
                    info!(
                        model = self.backend.model_name(),
                        attempt = attempt + 1,
                        claims = result.claims.len(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Analysis succeeded"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        model = self.backend.model_name(),
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %e,
                        "Analysis attempt failed"
                    );
                    last_error = Some(e);
                }
            }

            if attempt + 1 < attempts {
                let delay = self.policy.delay_after(attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Backing off before retry");
                tokio::time::sleep(delay).await;
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        Err(Error::Analysis(format!(
            "gave up after {} attempts: {}",
            attempts, reason
        )))
    }
}

#[async_trait]
impl<B: AnalysisBackend> AnalysisClient for RetryingAnalyzer<B> {
    async fn analyze(&self, audio: &Path, keyframes: &[PathBuf]) -> Result<AnalysisResult> {
        let prepared = self.prepare_with_retry(audio, keyframes).await?;
        let outcome = self.attempt_all(&prepared).await;

        if let Err(e) = self.backend.release(prepared).await {
            warn!(
                model = self.backend.model_name(),
                error = %e,
                "Failed to release analysis inputs"
            );
        }

        outcome
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}
