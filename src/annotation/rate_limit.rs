use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum spacing between outbound remote calls
///
/// The limiter only remembers when the previous call was let through. It is
/// owned by a single caller and is not shared between tasks.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum gap between two calls, `None` when limiting is disabled
    interval: Option<Duration>,
    /// When the previous call was let through
    last_call: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter allowing `calls_per_minute` calls; `None` or 0 disables it
    pub fn new(calls_per_minute: Option<u32>) -> Self {
        let interval = calls_per_minute
            .filter(|rate| *rate > 0)
            .map(|rate| Duration::from_secs_f64(60.0 / rate as f64));

        Self { interval, last_call: None }
    }

    /// A limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Minimum gap between calls, if limiting is enabled
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Suspend until the configured interval has passed since the previous call
    pub async fn wait(&mut self) {
        if let (Some(interval), Some(last_call)) = (self.interval, self.last_call) {
            let elapsed = last_call.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}
