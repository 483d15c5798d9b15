//! Tracker options.
//!
//! Built once at construction and never mutated afterwards. Defaults are
//! applied in [`Default`]; the `with_*` methods return modified copies.

use chrono::Duration;
use shared::retry::RetryPolicy;
use shared::validation::MODEL_NAME_REGEX;
use validator::Validate;

/// Default name of the table holding join records.
pub const DEFAULT_MODEL_NAME: &str = "invite_joins";

/// Default minimum account age before a join is considered genuine.
pub const DEFAULT_ACCOUNT_AGE_THRESHOLD_DAYS: i64 = 7;

/// Default minimum time since the last leave before a rejoin is considered genuine.
pub const DEFAULT_REJOIN_THRESHOLD_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct TrackerOptions {
    /// Name of the persisted collection (SQL table).
    #[validate(regex(
        path = *MODEL_NAME_REGEX,
        message = "model_name must be a lowercase SQL identifier"
    ))]
    model_name: String,

    /// Log retries and swallowed failures at warn/error instead of debug.
    verbose: bool,

    account_age_threshold: Duration,

    rejoin_threshold: Duration,

    retry: RetryPolicy,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            verbose: false,
            account_age_threshold: Duration::days(DEFAULT_ACCOUNT_AGE_THRESHOLD_DAYS),
            rejoin_threshold: Duration::days(DEFAULT_REJOIN_THRESHOLD_DAYS),
            retry: RetryPolicy::default(),
        }
    }
}

impl TrackerOptions {
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_account_age_threshold(mut self, threshold: Duration) -> Self {
        self.account_age_threshold = threshold;
        self
    }

    pub fn with_rejoin_threshold(mut self, threshold: Duration) -> Self {
        self.rejoin_threshold = threshold;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn account_age_threshold(&self) -> Duration {
        self.account_age_threshold
    }

    pub fn rejoin_threshold(&self) -> Duration {
        self.rejoin_threshold
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }
}
