//! Bounded retry of fallible async operations.
//!
//! Every remote call made by the tracker (invite fetches, vanity lookups, the
//! initial database connection) goes through [`Retry`]. The loop is bounded by
//! [`RetryPolicy::max_attempts`] and waits a fixed [`RetryPolicy::delay`]
//! between attempts. There is no backoff and no jitter.
//!
//! Two failure modes are exposed:
//! - [`Retry::critical`] returns [`RetryError::Exhausted`] once all attempts
//!   fail, so the caller can abort.
//! - [`Retry::best_effort`] logs the exhaustion and returns `None`, so the
//!   caller can continue with stale data.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default fixed delay between two attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Attempt budget and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Fixed wait between a failed attempt and the next one.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Error returned when every attempt of a critical operation failed.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    #[error("{label} failed after {attempts} attempts: {source}")]
    Exhausted {
        label: String,
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The error returned by the last attempt.
    pub fn into_source(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } => source,
        }
    }
}

/// Waits between attempts. Injected so tests can run without real delay.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry controller.
///
/// Cheap to clone; the sleeper is shared.
#[derive(Clone)]
pub struct Retry {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    verbose: bool,
}

impl std::fmt::Debug for Retry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retry")
            .field("policy", &self.policy)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl Retry {
    /// Create a controller that sleeps on the tokio timer.
    ///
    /// With `verbose` set, retries and exhaustion are logged at warn/error
    /// level instead of debug.
    pub fn new(policy: RetryPolicy, verbose: bool) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
            verbose,
        }
    }

    /// Replace the sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// On exhaustion the last error is returned inside [`RetryError::Exhausted`].
    pub async fn critical<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let result = self.run(label, op).await;
        if let Err(ref e) = result {
            error!(operation = label, attempts = e.attempts(), error = %e, "Operation failed, giving up");
        }
        result
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// On exhaustion the failure is logged and `None` is returned.
    pub async fn best_effort<T, E, F, Fut>(&self, label: &str, op: F) -> Option<T>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.run(label, op).await {
            Ok(value) => Some(value),
            Err(e) => {
                if self.verbose {
                    error!(operation = label, attempts = e.attempts(), error = %e, "Operation failed, continuing without it");
                } else {
                    debug!(operation = label, attempts = e.attempts(), error = %e, "Operation failed, continuing without it");
                }
                None
            }
        }
    }

    async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    if self.verbose {
                        warn!(
                            operation = label,
                            attempt = attempt,
                            next_attempt = attempt + 1,
                            max_attempts = max_attempts,
                            error = %e,
                            "Operation failed, retrying"
                        );
                    } else {
                        debug!(
                            operation = label,
                            attempt = attempt,
                            max_attempts = max_attempts,
                            error = %e,
                            "Operation failed, retrying"
                        );
                    }
                    self.sleeper.sleep(self.policy.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(RetryError::Exhausted {
                        label: label.to_string(),
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }
}
