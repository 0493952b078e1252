use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Backoff policy for connect-time retries.
///
/// The delay before retry `n` (1-based) is
/// `min(initial_delay_ms * multiplier^(n-1), max_delay_ms)`, optionally scaled
/// into the 50%..100% band when jitter is enabled.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    pub fn with_max_delay(mut self, delay_ms: u64) -> Self {
        self.max_delay_ms = delay_ms;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Delay to wait before the given retry (1-based), before jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let scaled = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.use_jitter {
            jitter(base)
        } else {
            base
        }
    }
}

impl Default for RetryConfig {
    /// 5 retries, 250ms doubling up to 10s: a database that is still starting
    /// (compose / k8s) gets roughly 8 seconds to come up.
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 250,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

/// Scale a delay into the 50%..100% band using the clock's sub-second noise.
fn jitter(delay: Duration) -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let factor = 0.5 + (nanos % 500) as f64 / 1000.0;
    delay.mul_f64(factor)
}

/// Run `operation` until it succeeds or the retry budget is spent.
///
/// `label` only feeds the log lines. The last error is returned together with
/// the number of attempts made.
pub async fn retry_with_backoff<F, Fut, T, E>(
    label: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, (u32, E)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = label, attempt, "Succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) if attempt > config.max_retries => {
                warn!(operation = label, attempts = attempt, error = %e, "Giving up");
                return Err((attempt, e));
            }
            Err(e) => {
                let delay = config.delay(attempt);
                debug!(
                    operation = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
