// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Arguments passed to the [`on_timeout`][super::TimeoutLayer::on_timeout] callback and to
/// telemetry listeners.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OnTimeoutArgs {
    pub(super) timeout: Duration,
}

impl OnTimeoutArgs {
    /// The timeout that was exceeded.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Arguments passed to the [`timeout_generator`][super::TimeoutLayer::timeout_generator].
#[derive(Debug)]
#[non_exhaustive]
pub struct TimeoutGeneratorArgs {
    pub(super) default_timeout: Duration,
}

impl TimeoutGeneratorArgs {
    /// The timeout configured through [`timeout`][super::TimeoutLayer::timeout].
    ///
    /// Returning `None` from the generator applies it as well.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}
