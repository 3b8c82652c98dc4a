// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Plain configuration records for the built-in strategies.
//!
//! Each record can be deserialized (feature `serde`), checked with `validate()` and applied to
//! a layer builder through its `config` method. Layers trust the values they are given, so
//! validate configuration read from external sources before applying it.
//!
//! ```
//! # #[cfg(feature = "retry")]
//! # {
//! use std::time::Duration;
//!
//! use airbag::config::RetryConfig;
//!
//! let mut config = RetryConfig::default();
//! config.max_delay = Some(Duration::from_millis(100));
//!
//! let error = config.validate().unwrap_err();
//! assert_eq!(error.section(), "retry");
//! # }
//! ```

#[cfg(any(feature = "retry", feature = "timeout", feature = "circuit-breaker", test))]
use std::time::Duration;

#[cfg(any(feature = "retry", test))]
use crate::Backoff;

/// Longest delay, timeout or break duration accepted by validation.
#[cfg(any(feature = "retry", feature = "timeout", feature = "circuit-breaker", test))]
const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Returned by `validate()` when a configuration record breaks one or more rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {section} options: {}", .messages.join("; "))]
pub struct ConfigError {
    section: &'static str,
    messages: Vec<String>,
}

impl ConfigError {
    /// The configuration record that failed validation, e.g. `retry`.
    #[must_use]
    pub fn section(&self) -> &'static str {
        self.section
    }

    /// One human-readable message per violated rule.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// Collects rule violations of one record.
#[cfg(any(feature = "retry", feature = "timeout", feature = "circuit-breaker", test))]
struct Violations {
    section: &'static str,
    messages: Vec<String>,
}

#[cfg(any(feature = "retry", feature = "timeout", feature = "circuit-breaker", test))]
impl Violations {
    fn new(section: &'static str) -> Self {
        Self {
            section,
            messages: Vec::new(),
        }
    }

    fn check(&mut self, ok: bool, message: impl FnOnce() -> String) {
        if !ok {
            self.messages.push(message());
        }
    }

    fn check_duration(&mut self, name: &str, value: Duration, min: Duration, max: Duration) {
        self.check(value >= min && value <= max, || {
            format!("`{name}` must be between {min:?} and {max:?}, got {value:?}")
        });
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(ConfigError {
                section: self.section,
                messages: self.messages,
            })
        }
    }
}

/// Configuration of a [`Retry`][crate::retry::Retry] strategy.
#[cfg(any(feature = "retry", test))]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
#[non_exhaustive]
pub struct RetryConfig {
    /// Whether the strategy applies to executions at all.
    pub enabled: bool,

    /// Retries after the initial call.
    pub max_retry_attempts: u32,

    /// Shape of the delay schedule.
    pub backoff: Backoff,

    /// Delay the schedule is derived from.
    pub base_delay: Duration,

    /// Optional cap on every delay.
    pub max_delay: Option<Duration>,

    /// Randomize delays.
    pub use_jitter: bool,
}

#[cfg(any(feature = "retry", test))]
impl Default for RetryConfig {
    fn default() -> Self {
        use crate::retry::constants::{DEFAULT_BACKOFF, DEFAULT_BASE_DELAY, DEFAULT_RETRY_ATTEMPTS, DEFAULT_USE_JITTER};

        Self {
            enabled: true,
            max_retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: None,
            use_jitter: DEFAULT_USE_JITTER,
        }
    }
}

#[cfg(any(feature = "retry", test))]
impl RetryConfig {
    /// Checks that the base delay is at most one day and that `max_delay`, when set, is not
    /// shorter than the base delay.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing every violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = Violations::new("retry");

        violations.check_duration("base_delay", self.base_delay, Duration::ZERO, MAX_DURATION);

        if let Some(max_delay) = self.max_delay {
            violations.check(max_delay >= self.base_delay, || {
                format!(
                    "`max_delay` ({max_delay:?}) must not be shorter than `base_delay` ({:?})",
                    self.base_delay
                )
            });
        }

        violations.finish()
    }
}

/// Configuration of a [`Timeout`][crate::timeout::Timeout] strategy.
#[cfg(any(feature = "timeout", test))]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
#[non_exhaustive]
pub struct TimeoutConfig {
    /// Whether the strategy applies to executions at all.
    pub enabled: bool,

    /// Time budget of one execution.
    pub timeout: Duration,
}

#[cfg(any(feature = "timeout", test))]
impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: crate::timeout::constants::DEFAULT_TIMEOUT,
        }
    }
}

#[cfg(any(feature = "timeout", test))]
impl TimeoutConfig {
    /// Checks that the timeout lies between 10 milliseconds and one day.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing every violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = Violations::new("timeout");
        violations.check_duration("timeout", self.timeout, Duration::from_millis(10), MAX_DURATION);
        violations.finish()
    }
}

/// Configuration of a [`CircuitBreaker`][crate::circuit_breaker::CircuitBreaker] strategy.
#[cfg(any(feature = "circuit-breaker", test))]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
#[non_exhaustive]
pub struct CircuitBreakerConfig {
    /// Whether the strategy applies to executions at all.
    pub enabled: bool,

    /// Failure ratio in `(0, 1]` at which the circuit opens.
    pub failure_threshold: f64,

    /// Executions that must be observed within the sampling duration before the circuit may open.
    pub min_throughput: u32,

    /// Time span over which the failure ratio is computed.
    pub sampling_duration: Duration,

    /// How long the circuit stays open before admitting a trial.
    pub break_duration: Duration,
}

#[cfg(any(feature = "circuit-breaker", test))]
impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        use crate::circuit_breaker::constants::{
            DEFAULT_BREAK_DURATION, DEFAULT_FAILURE_THRESHOLD, DEFAULT_MIN_THROUGHPUT, DEFAULT_SAMPLING_DURATION,
        };

        Self {
            enabled: true,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            min_throughput: DEFAULT_MIN_THROUGHPUT,
            sampling_duration: DEFAULT_SAMPLING_DURATION,
            break_duration: DEFAULT_BREAK_DURATION,
        }
    }
}

#[cfg(any(feature = "circuit-breaker", test))]
impl CircuitBreakerConfig {
    /// Checks the failure threshold, the minimum throughput (at least 2), the sampling duration
    /// (at least 500 ms) and the break duration (500 ms to one day).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing every violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = Violations::new("circuit breaker");

        violations.check(self.failure_threshold > 0.0 && self.failure_threshold <= 1.0, || {
            format!("`failure_threshold` must be in (0, 1], got {}", self.failure_threshold)
        });
        violations.check(self.min_throughput >= 2, || {
            format!("`min_throughput` must be at least 2, got {}", self.min_throughput)
        });
        violations.check(self.sampling_duration >= Duration::from_millis(500), || {
            format!("`sampling_duration` must be at least 500ms, got {:?}", self.sampling_duration)
        });
        violations.check_duration("break_duration", self.break_duration, Duration::from_millis(500), MAX_DURATION);

        violations.finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RetryConfig::default().validate().unwrap();
        TimeoutConfig::default().validate().unwrap();
        CircuitBreakerConfig::default().validate().unwrap();
    }

    #[test]
    fn defaults_match_layers() {
        let retry = RetryConfig::default();
        assert!(retry.enabled);
        assert_eq!(retry.max_retry_attempts, 3);
        assert_eq!(retry.backoff, Backoff::Exponential);
        assert_eq!(retry.base_delay, Duration::from_secs(2));
        assert!(retry.use_jitter);

        assert_eq!(TimeoutConfig::default().timeout, Duration::from_secs(30));

        let breaker = CircuitBreakerConfig::default();
        assert!((breaker.failure_threshold - 0.1).abs() < f64::EPSILON);
        assert_eq!(breaker.min_throughput, 100);
        assert_eq!(breaker.sampling_duration, Duration::from_secs(30));
        assert_eq!(breaker.break_duration, Duration::from_secs(5));
    }

    #[test]
    fn retry_max_delay_below_base() {
        let config = RetryConfig {
            max_delay: Some(Duration::from_millis(100)),
            ..RetryConfig::default()
        };

        let error = config.validate().unwrap_err();
        assert_eq!(error.section(), "retry");
        assert_eq!(error.messages().len(), 1);
        assert!(error.to_string().starts_with("invalid retry options: `max_delay`"));
    }

    #[test]
    fn retry_base_delay_too_long() {
        let config = RetryConfig {
            base_delay: Duration::from_secs(2 * 24 * 60 * 60),
            ..RetryConfig::default()
        };

        assert!(config.validate().unwrap_err().messages()[0].contains("base_delay"));
    }

    #[test]
    fn timeout_bounds() {
        for (timeout, valid) in [
            (Duration::from_millis(9), false),
            (Duration::from_millis(10), true),
            (MAX_DURATION, true),
            (MAX_DURATION + Duration::from_secs(1), false),
        ] {
            let config = TimeoutConfig {
                timeout,
                ..TimeoutConfig::default()
            };
            assert_eq!(config.validate().is_ok(), valid, "{timeout:?}");
        }
    }

    #[test]
    fn circuit_breaker_lists_every_violation() {
        let config = CircuitBreakerConfig {
            enabled: true,
            failure_threshold: 0.0,
            min_throughput: 1,
            sampling_duration: Duration::from_millis(100),
            break_duration: Duration::from_millis(100),
        };

        let error = config.validate().unwrap_err();

        assert_eq!(error.section(), "circuit breaker");
        assert_eq!(error.messages().len(), 4);
        assert!(error.to_string().starts_with("invalid circuit breaker options: "));
        assert!(error.to_string().contains("; "));
    }

    #[test]
    fn circuit_breaker_threshold_upper_bound() {
        let mut config = CircuitBreakerConfig {
            failure_threshold: 1.0,
            ..CircuitBreakerConfig::default()
        };
        config.validate().unwrap();

        config.failure_threshold = 1.01;
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_with_defaults() {
        let config: RetryConfig = serde_json::from_str(r#"{ "max_retry_attempts": 5, "backoff": "linear" }"#).unwrap();

        assert_eq!(config.max_retry_attempts, 5);
        assert_eq!(config.backoff, Backoff::Linear);
        assert_eq!(config.base_delay, Duration::from_secs(2));

        let config: TimeoutConfig = serde_json::from_str(r#"{ "enabled": false }"#).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
