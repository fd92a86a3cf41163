//! Store configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use ensemble_core::LogFormat;
use ensemble_core::error::{Error, Result};

/// Default path of the topology document in the coordination store.
pub const DEFAULT_DOCUMENT_PATH: &str = "/topology";

/// Default maximum number of update attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(5);
const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Upper bound (exclusive, milliseconds) of the jitter added to each backoff.
const JITTER_MS: u64 = 5;

/// Retry policy for the optimistic update loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum attempts (fetch through conditional write). `None` retries
    /// until the write lands.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry; doubles per attempt.
    pub backoff_base: Duration,
    /// Cap on the exponential delay.
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries until the write lands.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// A policy with no delay between attempts.
    #[must_use]
    pub fn immediate(max_attempts: Option<u32>) -> Self {
        Self {
            max_attempts,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    /// Returns whether another attempt may follow `attempts` failed ones.
    #[must_use]
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }

    /// Delay to sleep after the `attempt`-th lost race (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        if self.backoff_max.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .backoff_base
            .saturating_mul(1 << exponent)
            .min(self.backoff_max);
        delay + Duration::from_millis(rand_jitter())
    }
}

/// Generates jitter for backoff (0 to 5 ms).
fn rand_jitter() -> u64 {
    use std::time::SystemTime;
    let seed = u64::from(
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos(),
    );
    seed % JITTER_MS
}

/// Configuration for a [`TopologyStore`](crate::TopologyStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the topology document.
    pub document_path: String,
    /// Retry policy for updates.
    pub retry: RetryPolicy,
    /// Log output format for processes embedding the store.
    pub log_format: LogFormat,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            document_path: DEFAULT_DOCUMENT_PATH.to_string(),
            retry: RetryPolicy::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl StoreConfig {
    /// Loads configuration from environment variables.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `ENSEMBLE_TOPOLOGY_PATH` | Document path (default `/topology`) |
    /// | `ENSEMBLE_CAS_MAX_ATTEMPTS` | Attempt limit; `0` or `unbounded` for none |
    /// | `ENSEMBLE_CAS_BACKOFF_BASE_MS` | First retry delay in milliseconds |
    /// | `ENSEMBLE_CAS_BACKOFF_MAX_MS` | Retry delay cap in milliseconds |
    /// | `ENSEMBLE_LOG_FORMAT` | `json` or `pretty` |
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let mut config = Self::default();

        if let Some(path) = env.string("ENSEMBLE_TOPOLOGY_PATH") {
            if !path.starts_with('/') {
                return Err(Error::InvalidInput(format!(
                    "ENSEMBLE_TOPOLOGY_PATH must start with '/' (got {path})"
                )));
            }
            config.document_path = path;
        }
        if let Some(value) = env.string("ENSEMBLE_CAS_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_max_attempts("ENSEMBLE_CAS_MAX_ATTEMPTS", &value)?;
        }
        if let Some(ms) = env.u64("ENSEMBLE_CAS_BACKOFF_BASE_MS")? {
            config.retry.backoff_base = Duration::from_millis(ms);
        }
        if let Some(ms) = env.u64("ENSEMBLE_CAS_BACKOFF_MAX_MS")? {
            config.retry.backoff_max = Duration::from_millis(ms);
        }
        if config.retry.backoff_base > config.retry.backoff_max {
            return Err(Error::InvalidInput(
                "ENSEMBLE_CAS_BACKOFF_BASE_MS cannot exceed ENSEMBLE_CAS_BACKOFF_MAX_MS"
                    .to_string(),
            ));
        }
        if let Some(format) = env.string("ENSEMBLE_LOG_FORMAT") {
            config.log_format = format.parse().map_err(|_| {
                Error::InvalidInput(format!(
                    "ENSEMBLE_LOG_FORMAT must be json or pretty (got {format})"
                ))
            })?;
        }

        Ok(config)
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn u64(&self, name: &str) -> Result<Option<u64>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u64>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
    }
}

fn parse_max_attempts(name: &str, value: &str) -> Result<Option<u32>> {
    if value.eq_ignore_ascii_case("unbounded") {
        return Ok(None);
    }
    match value.parse::<u32>() {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(e) => Err(Error::InvalidInput(format!(
            "{name} must be a u32 or 'unbounded': {e}"
        ))),
    }
}
