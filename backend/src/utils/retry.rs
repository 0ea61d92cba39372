// src/utils/retry.rs

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Random extra wait added to every backoff, so retries from several
    /// instances do not hit the database in lockstep.
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }
}

/// Runs `f` until it succeeds or `max_attempts` is used up, doubling the
/// wait between tries up to `max_backoff`. Returns the last error.
pub async fn retry_async_with_config<F, Fut, T, E>(config: &RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts_left = config.max_attempts.max(1);
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left -= 1;
                if attempts_left == 0 {
                    return Err(e);
                }

                let wait = backoff + jitter(config.jitter_max);
                tracing::warn!(error = %e, retry_in_ms = wait.as_millis() as u64, "Retrying failed operation");
                tokio::time::sleep(wait).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}

fn jitter(jitter_max: Option<Duration>) -> Duration {
    match jitter_max.map(|max| max.as_millis() as u64) {
        Some(max_ms) if max_ms > 0 => Duration::from_millis(rand::random::<u64>() % (max_ms + 1)),
        _ => Duration::ZERO,
    }
}
