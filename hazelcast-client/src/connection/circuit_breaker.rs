//! Bounded retry driver with jittered exponential backoff.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hazelcast_core::{HazelcastError, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryConfig;

/// Delay to wait after the given (1-based) failed attempt.
pub type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Random source shared by all backoff schedules of one manager.
pub type SharedRng = Arc<Mutex<StdRng>>;

/// Creates a random source seeded once from OS entropy.
pub fn seeded_rng() -> SharedRng {
    Arc::new(Mutex::new(StdRng::from_entropy()))
}

/// Builds an exponential schedule: `initial * multiplier^(attempt - 1)`,
/// scaled by a random factor in `1 ± jitter` and capped at `max`.
pub fn exponential_backoff(
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: f64,
    rng: SharedRng,
) -> BackoffFn {
    Arc::new(move |attempt| {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = initial.as_secs_f64() * multiplier.powi(exponent);
        let base = base.min(max.as_secs_f64());

        let jitter_factor = if jitter > 0.0 {
            1.0 + rng.lock().gen_range(-jitter..=jitter)
        } else {
            1.0
        };

        Duration::from_secs_f64((base * jitter_factor).max(0.0)).min(max)
    })
}

/// Limits applied by [`CircuitBreaker::try_execute`].
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Consecutive failures after which the breaker opens and gives up.
    pub max_consecutive_failures: u32,
    /// Bound on the whole call, backoff sleeps included.
    pub timeout: Duration,
    /// Backoff schedule keyed by attempt number.
    pub backoff: BackoffFn,
}

impl RetryPolicy {
    /// Derives a policy from the retry configuration.
    pub fn from_config(config: &RetryConfig, rng: SharedRng) -> Self {
        Self {
            max_retries: config.max_retries(),
            max_consecutive_failures: config.max_retries().saturating_add(1),
            timeout: config.cluster_connect_timeout(),
            backoff: exponential_backoff(
                config.initial_backoff(),
                config.max_backoff(),
                config.multiplier(),
                config.jitter(),
                rng,
            ),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("max_consecutive_failures", &self.max_consecutive_failures)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// State of the breaker after the most recent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    /// The last call succeeded or none has run yet.
    Closed,
    /// The last call gave up after too many consecutive failures.
    Open,
}

/// Repeatedly runs an operation until it succeeds or the policy gives up.
#[derive(Debug)]
pub struct CircuitBreaker {
    policy: RetryPolicy,
    state: Mutex<CircuitBreakerState>,
}

impl CircuitBreaker {
    /// Creates a breaker with the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(CircuitBreakerState::Closed),
        }
    }

    /// Returns the policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the state left by the most recent call.
    pub fn state(&self) -> CircuitBreakerState {
        *self.state.lock()
    }

    /// Runs `op` with the attempt number (starting at 1) until it succeeds.
    ///
    /// Gives up and returns:
    /// - the error itself if it is non-retryable,
    /// - the last error once the attempt budget or the consecutive-failure
    ///   limit is exhausted,
    /// - `Timeout` once the policy timeout elapses,
    /// - `Cancelled` when `cancel` fires.
    pub async fn try_execute<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let deadline = Instant::now() + self.policy.timeout;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HazelcastError::Cancelled(
                "retry cancelled".to_string(),
            )),
            result = tokio::time::timeout_at(deadline, self.run(&mut op)) => match result {
                Ok(result) => result,
                Err(_) => Err(HazelcastError::Timeout(format!(
                    "gave up after {:?}",
                    self.policy.timeout
                ))),
            },
        };

        *self.state.lock() = match outcome {
            Ok(_) => CircuitBreakerState::Closed,
            Err(_) => CircuitBreakerState::Open,
        };
        outcome
    }

    async fn run<T, F, Fut>(&self, op: &mut F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        let mut consecutive_failures = 0u32;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.is_non_retryable() {
                debug!(attempt, error = %err, "non-retryable failure");
                return Err(err);
            }

            consecutive_failures += 1;
            if attempt > self.policy.max_retries
                || consecutive_failures >= self.policy.max_consecutive_failures
            {
                warn!(attempt, error = %err, "retry budget exhausted");
                return Err(err);
            }

            let delay = (self.policy.backoff)(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
