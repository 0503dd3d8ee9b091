//! Session-wide limits and retry policy.
//!
//! # Design
//! `SessionConfig` holds the settings that survive across requests until an
//! explicit reset: the response size ceiling, the timeout and the retry
//! policy. It derives serde so a host application can keep it in its own
//! configuration file, and `from_env` lets deployments tune the defaults
//! without recompiling.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// First allocation of the response buffer.
pub const INITIAL_RESPONSE_CAPACITY: usize = 8 * 1024;

/// Default ceiling for the response buffer (4 MiB).
pub const DEFAULT_RESPONSE_LIMIT: usize = 4 * 1024 * 1024;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Upper bound on key-value pairs and multipart entries.
pub const MAX_FORM_FIELDS: usize = 512;

pub const ENV_RESPONSE_LIMIT: &str = "HTTPQ_RESPONSE_LIMIT";
pub const ENV_TIMEOUT_SECS: &str = "HTTPQ_TIMEOUT_SECS";
pub const ENV_RETRY_POLICY: &str = "HTTPQ_RETRY_POLICY";

/// What the executor does when an attempt times out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// The timeout is the final result.
    NoRetry,
    /// Perform exactly one more attempt on a fresh connection.
    #[default]
    RetryOnTimeout,
}

impl FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_retry" | "none" | "off" => Ok(RetryPolicy::NoRetry),
            "retry_on_timeout" | "timeout" | "on" => Ok(RetryPolicy::RetryOnTimeout),
            other => Err(format!("unknown retry policy: {other}")),
        }
    }
}

/// Settings that persist across requests until `reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Response buffer ceiling in bytes.
    pub response_limit: usize,
    /// Per-attempt timeout in seconds; 0 disables it.
    pub timeout_secs: u64,
    pub retry_policy: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_limit: DEFAULT_RESPONSE_LIMIT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `HTTPQ_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SessionConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(limit) = parse_var(&lookup, ENV_RESPONSE_LIMIT) {
            config.response_limit = limit;
        }
        if let Some(secs) = parse_var(&lookup, ENV_TIMEOUT_SECS) {
            config.timeout_secs = secs;
        }
        if let Some(policy) = parse_var(&lookup, ENV_RETRY_POLICY) {
            config.retry_policy = policy;
        }
        config
    }

    /// Timeout applied to each attempt; `None` means unlimited.
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, value = %raw, error = %err, "ignoring invalid session setting");
            None
        }
    }
}
