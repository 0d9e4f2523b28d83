//! Bounded retry for retryable failures.
//!
//! A [`RetryPolicy`] re-runs a call while its outcome is classified as
//! retryable (see [`ArangoError::is_retryable`] and [`ApiError::is_retryable`])
//! and the attempt budget allows it. Attempts are strictly sequential and the
//! last outcome is returned as is, whether it succeeded or not.

use std::{
    fmt,
    future::Future,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    envelope::Response,
    error::{ApiError, ArangoError, ArangoResult},
};

/// Boxed error returned by an [`ExceptionHook`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Maps a 1-based retry index to the delay before that retry.
pub type SleepDuration = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Caller-supplied notification invoked with the final error of a call.
///
/// A failing or panicking hook is logged; it never replaces the error being
/// reported.
pub type ExceptionHook = Arc<dyn Fn(&ArangoError) -> Result<(), BoxError> + Send + Sync>;

/// Retry configuration.
///
/// # Example
///
/// ```ignore
/// let policy = RetryPolicy::exponential(3, Duration::from_millis(100), Duration::from_secs(2));
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    enabled: bool,
    retry_count: u32,
    sleep_duration: SleepDuration,
}

impl RetryPolicy {
    /// Creates a policy from its three settings.
    pub fn new(
        enabled: bool,
        retry_count: u32,
        sleep_duration: impl Fn(u32) -> Duration + Send + Sync + 'static,
    ) -> Self {
        Self {
            enabled,
            retry_count,
            sleep_duration: Arc::new(sleep_duration),
        }
    }

    /// Exactly one attempt per call.
    pub fn disabled() -> Self {
        Self::new(false, 0, |_| Duration::ZERO)
    }

    /// `retry_count` retries, `delay` apart.
    pub fn fixed(retry_count: u32, delay: Duration) -> Self {
        Self::new(true, retry_count, move |_| delay)
    }

    /// `retry_count` retries, doubling from `base` up to `max`.
    pub fn exponential(retry_count: u32, base: Duration, max: Duration) -> Self {
        Self::new(true, retry_count, move |attempt| {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            base.saturating_mul(factor).min(max)
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The delay before retry number `attempt` (1-based).
    pub fn sleep_duration(&self, attempt: u32) -> Duration {
        (self.sleep_duration)(attempt)
    }

    /// Total attempts a call may make under this policy.
    pub fn max_attempts(&self) -> u32 {
        if self.enabled {
            self.retry_count.saturating_add(1)
        } else {
            1
        }
    }

    /// Runs `op` until it yields a non-retryable outcome or the budget is
    /// spent, then reports any final error to `hook` and returns the outcome.
    ///
    /// `op` receives the 1-based attempt number. Cancellation is checked
    /// before every attempt and interrupts the sleep between attempts.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Cancelled`] if `cancel` fires, otherwise
    /// whatever the last attempt returned.
    pub async fn run<F, Fut>(
        &self,
        cancel: &CancellationToken,
        hook: Option<&ExceptionHook>,
        mut op: F,
    ) -> ArangoResult<Response>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ArangoResult<Response>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ArangoError::Cancelled);
            }

            attempt += 1;
            let outcome = op(attempt).await;

            if !is_retryable(&outcome) || attempt >= max_attempts {
                if attempt > 1 {
                    debug!(attempt, max_attempts, "retry loop finished");
                }
                notify(hook, &outcome);
                return outcome;
            }

            let delay = self.sleep_duration(attempt);
            info!(attempt, max_attempts, delay_ms = delay.as_millis() as u64, "retrying call");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ArangoError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(200), Duration::from_secs(5))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("enabled", &self.enabled)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}

fn is_retryable(outcome: &ArangoResult<Response>) -> bool {
    match outcome {
        Ok(response) => response.exception().is_some_and(ApiError::is_retryable),
        Err(err) => err.is_retryable(),
    }
}

fn notify(hook: Option<&ExceptionHook>, outcome: &ArangoResult<Response>) {
    let Some(hook) = hook else {
        return;
    };

    let reported = match outcome {
        Ok(response) => match response.exception() {
            Some(api) => ArangoError::Api(api.clone()),
            None => return,
        },
        Err(ArangoError::Cancelled) => return,
        Err(err) => return call_hook(hook, err),
    };

    call_hook(hook, &reported);
}

fn call_hook(hook: &ExceptionHook, err: &ArangoError) {
    match catch_unwind(AssertUnwindSafe(|| hook(err))) {
        Ok(Ok(())) => {}
        Ok(Err(hook_err)) => warn!(error = %err, hook_error = %hook_err, "exception hook failed"),
        Err(_) => error!(error = %err, "exception hook panicked"),
    }
}
