//! Re-running operations that lost an optimistic-concurrency race.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::DomainError;

pub const DEFAULT_ATTEMPTS: u32 = 5;

const BASE_DELAY_MS: f64 = 5.0;
const MAX_DELAY_MS: f64 = 200.0;

/// Exponential backoff before retry `attempt` (1-based), with ±25% jitter
/// so writers that collided do not collide again in lockstep.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16) as i32;
    let delay = (BASE_DELAY_MS * 2f64.powi(exponent)).min(MAX_DELAY_MS);
    let jitter = delay * 0.25 * rand::rng().random_range(-1.0..=1.0);
    Duration::from_micros(((delay + jitter).clamp(0.0, MAX_DELAY_MS) * 1000.0) as u64)
}

/// Runs `attempt` until it stops failing with a version conflict.
///
/// Each run must load fresh state, so every precondition is evaluated
/// again against what the winner committed. Conflicts back off with
/// [`backoff_delay`]; non-conflict errors return immediately. After
/// `attempts` conflicts the operation gives up with `RetriesExhausted`.
pub async fn with_conflict_retry<T, F, Fut>(
    operation: &'static str,
    attempts: u32,
    mut attempt: F,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let attempts = attempts.max(1);

    for n in 1..=attempts {
        match attempt().await {
            Err(e) if e.is_conflict() => {
                metrics::counter!("uow_conflicts_total", "operation" => operation).increment(1);
                if n < attempts {
                    let delay = backoff_delay(n);
                    tracing::debug!(
                        operation,
                        attempt = n,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "version conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
            other => return other,
        }
    }

    tracing::warn!(operation, attempts, "giving up after repeated version conflicts");
    Err(DomainError::RetriesExhausted {
        operation,
        attempts,
    })
}
