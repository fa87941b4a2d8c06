/*!
 * Retrying, rate-limited access to a remote model.
 *
 * Every remote call of the pipeline goes through a single `RetryingCaller`,
 * which owns the provider client, the rate limiter and the running token
 * usage totals.
 */

use log::{debug, warn};
use rand::Rng;
use std::time::{Duration, Instant};

use crate::app_config::RetryConfig;
use crate::errors::ProviderError;
use crate::providers::{ChatRequest, Completion, Provider};
use super::rate_limit::RateLimiter;

/// Bounded exponential backoff with random jitter
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Lower bound of every wait
    pub min_backoff: Duration,
    /// Upper bound of every wait
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            min_backoff: Duration::from_millis(config.min_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.min_backoff_ms)),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Range the wait before retry number `retry` (1-based) is drawn from
    pub fn backoff_bounds(&self, retry: u32) -> (Duration, Duration) {
        let exponent = retry.saturating_sub(1).min(31);
        let upper = self.min_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff);
        (self.min_backoff, upper.max(self.min_backoff))
    }

    /// Random wait before retry number `retry`
    pub fn backoff(&self, retry: u32) -> Duration {
        let (lower, upper) = self.backoff_bounds(retry);
        let lower_ms = lower.as_millis() as u64;
        let upper_ms = upper.as_millis() as u64;
        if upper_ms <= lower_ms {
            return lower;
        }
        Duration::from_millis(rand::rng().random_range(lower_ms..=upper_ms))
    }
}

/// Token usage statistics for a run
#[derive(Debug, Clone)]
pub struct TokenUsageStats {
    /// Number of prompt tokens
    pub prompt_tokens: u64,
    /// Number of completion tokens
    pub completion_tokens: u64,
    /// Total number of tokens
    pub total_tokens: u64,
    /// Successful remote calls
    pub calls: u64,
    /// Failed attempts that were retried or gave up
    pub failed_attempts: u64,
    /// Start time of token tracking
    pub start_time: Instant,
    /// Total time spent waiting on the provider
    pub api_duration: Duration,
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
}

impl Default for TokenUsageStats {
    fn default() -> Self {
        Self::with_provider_info(String::new(), String::new())
    }
}

impl TokenUsageStats {
    /// Create new token usage stats with provider info
    pub fn with_provider_info(provider: String, model: String) -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            calls: 0,
            failed_attempts: 0,
            start_time: Instant::now(),
            api_duration: Duration::ZERO,
            provider,
            model,
        }
    }

    /// Add the usage reported by one completion
    pub fn add_token_usage(&mut self, prompt_tokens: Option<u64>, completion_tokens: Option<u64>) {
        if let Some(pt) = prompt_tokens {
            self.prompt_tokens += pt;
            self.total_tokens += pt;
        }

        if let Some(ct) = completion_tokens {
            self.completion_tokens += ct;
            self.total_tokens += ct;
        }
    }

    /// Calculate tokens per minute over the time spent in API requests
    pub fn tokens_per_minute(&self) -> f64 {
        let duration_minutes = if self.api_duration.as_secs_f64() > 0.0 {
            self.api_duration.as_secs_f64() / 60.0
        } else {
            self.start_time.elapsed().as_secs_f64() / 60.0
        };

        if duration_minutes > 0.0 {
            self.total_tokens as f64 / duration_minutes
        } else {
            0.0
        }
    }

    /// Generate a summary of token usage
    pub fn summary(&self) -> String {
        let elapsed_minutes = self.start_time.elapsed().as_secs_f64() / 60.0;
        let api_minutes = self.api_duration.as_secs_f64() / 60.0;

        format!(
            "Token Usage Summary:\n\
             Provider: {}\n\
             Model: {}\n\
             Remote calls: {} ({} failed attempts)\n\
             Prompt tokens: {}\n\
             Completion tokens: {}\n\
             Total tokens: {}\n\
             Elapsed time: {:.2} minutes\n\
             API request time: {:.2} minutes\n\
             Tokens per minute: {:.2}",
            self.provider,
            self.model,
            self.calls,
            self.failed_attempts,
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens,
            elapsed_minutes,
            api_minutes,
            self.tokens_per_minute()
        )
    }
}

/// Runs remote completions through the rate limiter, retrying failures
#[derive(Debug)]
pub struct RetryingCaller {
    provider: Box<dyn Provider>,
    limiter: RateLimiter,
    policy: RetryPolicy,
    usage: TokenUsageStats,
}

impl RetryingCaller {
    /// Wrap a provider with a limiter and a retry policy
    pub fn new(provider: Box<dyn Provider>, limiter: RateLimiter, policy: RetryPolicy) -> Self {
        let usage = TokenUsageStats::with_provider_info(provider.name().to_string(), String::new());
        Self { provider, limiter, policy, usage }
    }

    /// Record the model name shown in the usage summary
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.usage.model = model.into();
        self
    }

    /// Name of the wrapped provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// The retry policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Token usage accumulated so far
    pub fn usage(&self) -> &TokenUsageStats {
        &self.usage
    }

    /// Complete `request`, retrying any failure until the attempt cap is reached
    pub async fn call(&mut self, request: &ChatRequest) -> Result<Completion, ProviderError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.limiter.wait().await;

            let started = Instant::now();
            let result = self.provider.complete(request).await;
            self.usage.api_duration += started.elapsed();

            match result {
                Ok(completion) => {
                    self.usage.calls += 1;
                    self.usage.add_token_usage(completion.prompt_tokens, completion.completion_tokens);
                    return Ok(completion);
                }
                Err(e) => {
                    self.usage.failed_attempts += 1;
                    if attempt >= self.policy.max_attempts {
                        warn!("{} call failed on final attempt {}/{}: {}",
                            self.provider.name(), attempt, self.policy.max_attempts, e);
                        return Err(ProviderError::RetriesExhausted {
                            attempts: attempt,
                            last_error: Box::new(e),
                        });
                    }

                    let delay = self.policy.backoff(attempt);
                    warn!("{} call failed (attempt {}/{}): {} - retrying in {:.1}s",
                        self.provider.name(), attempt, self.policy.max_attempts, e, delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                    debug!("Retrying {} call", self.provider.name());
                }
            }
        }
    }
}
