// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::Attempt;

/// Arguments for the [`clone_input_with`][super::RetryLayer::clone_input_with] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct CloneArgs {
    pub(super) attempt: Attempt,
}

impl CloneArgs {
    /// The attempt the cloned input is going to be used for.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }
}

/// Arguments for the [`should_handle`][super::RetryLayer::should_handle] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct ShouldRetryArgs {
    pub(super) attempt: Attempt,
}

impl ShouldRetryArgs {
    /// The attempt that produced the outcome being evaluated.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }
}

/// Arguments for the [`delay_generator`][super::RetryLayer::delay_generator] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct DelayGeneratorArgs {
    pub(super) attempt: Attempt,
    pub(super) backoff_delay: Duration,
}

impl DelayGeneratorArgs {
    /// The attempt that produced the outcome being retried.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// The delay computed by the configured backoff, used when the generator returns `None`.
    #[must_use]
    pub fn backoff_delay(&self) -> Duration {
        self.backoff_delay
    }
}

/// Arguments for the [`on_retry`][super::RetryLayer::on_retry] callback.
///
/// The same value is attached to the `OnRetry` telemetry event.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OnRetryArgs {
    pub(super) attempt: Attempt,
    pub(super) retry_delay: Duration,
    pub(super) duration: Duration,
}

impl OnRetryArgs {
    /// The attempt that produced the outcome being retried.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// How long the strategy waits before the next attempt.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Time spent in the retry strategy so far, delays included.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}
