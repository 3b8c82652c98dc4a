// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::HealthInfo;

/// Arguments for the [`on_opened`][super::CircuitBreakerLayer::on_opened] callback.
///
/// The same value is attached to the `OnCircuitOpened` telemetry event.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OnCircuitOpenedArgs {
    pub(super) break_duration: Duration,
    pub(super) is_manual: bool,
    pub(super) health: Option<HealthInfo>,
}

impl OnCircuitOpenedArgs {
    /// How long the circuit stays open before a trial is admitted.
    ///
    /// [`Duration::MAX`] for a manually isolated circuit.
    #[must_use]
    pub fn break_duration(&self) -> Duration {
        self.break_duration
    }

    /// Returns `true` if the circuit was isolated through
    /// [`CircuitBreakerManualControl`][super::CircuitBreakerManualControl].
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.is_manual
    }

    /// The health of the sampling window that broke the circuit.
    ///
    /// `None` when a failed trial re-opened the circuit or the circuit was isolated.
    #[must_use]
    pub fn health(&self) -> Option<HealthInfo> {
        self.health
    }
}

/// Arguments for the [`on_closed`][super::CircuitBreakerLayer::on_closed] callback.
///
/// The same value is attached to the `OnCircuitClosed` telemetry event.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OnCircuitClosedArgs {
    pub(super) is_manual: bool,
    pub(super) open_duration: Duration,
}

impl OnCircuitClosedArgs {
    /// Returns `true` if the circuit was closed through
    /// [`CircuitBreakerManualControl`][super::CircuitBreakerManualControl].
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.is_manual
    }

    /// How long the circuit rejected executions before it closed.
    #[must_use]
    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }
}

/// Arguments for the [`on_half_opened`][super::CircuitBreakerLayer::on_half_opened] callback.
///
/// The same value is attached to the `OnCircuitHalfOpened` telemetry event.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OnCircuitHalfOpenedArgs {
    pub(super) open_duration: Duration,
}

impl OnCircuitHalfOpenedArgs {
    /// How long the circuit was open before the trial got admitted.
    #[must_use]
    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }
}
