//! Exponential-backoff reconnection for broker consumers.
//!
//! When a consumer's connection drops (or cannot be established at start),
//! it calls [`reconnect_loop`] to keep retrying with increasing delays until
//! either the connection is restored or the [`CancellationToken`] fires.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Backoff schedule: `initial_delay`, then multiplied by `multiplier` after
/// every failed attempt, never exceeding `max_delay`.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Delay to use after `current` has elapsed and the attempt failed again.
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    if current >= config.max_delay {
        return config.max_delay;
    }
    current.mul_f64(config.multiplier).min(config.max_delay)
}

/// Call `connect` until it succeeds, sleeping with exponential backoff
/// between failures.
///
/// `component` names the caller (a queue or consumer) in logs.
/// Returns `None` if `cancel` fires first.
pub async fn reconnect_loop<T, E, F, Fut>(
    component: &str,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
    mut connect: F,
) -> Option<T>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(component, "Reconnect cancelled");
                return None;
            }
            result = connect() => {
                match result {
                    Ok(conn) => {
                        if attempt > 1 {
                            tracing::info!(component, attempt, "Reconnected to broker");
                        }
                        return Some(conn);
                    }
                    Err(e) => {
                        tracing::warn!(
                            component,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Connect attempt {attempt} failed",
                        );
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, config);
    }
}
