// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, Mutex, Weak};

use super::engine::CircuitEngine;
use crate::constants::ERR_POISONED_LOCK;

/// Manually isolates and closes circuits, e.g. to take a dependency out of rotation during
/// maintenance.
///
/// One control can be shared by any number of circuit breakers through
/// [`CircuitBreakerLayer::manual_control`][super::CircuitBreakerLayer::manual_control]. A
/// circuit built while the control is isolated starts isolated.
///
/// An isolated circuit rejects every execution with a
/// [`BrokenCircuit`][crate::BrokenCircuit] whose [`is_isolated`][crate::BrokenCircuit::is_isolated]
/// is `true`, regardless of the break duration, until [`close`][Self::close] is called.
/// Manual transitions are reported through telemetry only; the layer's `on_opened` and
/// `on_closed` callbacks observe automatic transitions.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerManualControl {
    shared: Arc<Mutex<ControlShared>>,
}

#[derive(Debug, Default)]
struct ControlShared {
    isolated: bool,
    engines: Vec<Weak<CircuitEngine>>,
}

impl CircuitBreakerManualControl {
    /// Creates a control that is not isolated and has no circuits attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` between [`isolate`][Self::isolate] and [`close`][Self::close].
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.shared.lock().expect(ERR_POISONED_LOCK).isolated
    }

    /// Holds every attached circuit open.
    pub fn isolate(&self) {
        for engine in self.set_isolated(true) {
            engine.isolate();
        }
    }

    /// Closes every attached circuit and resets its health metrics.
    pub fn close(&self) {
        for engine in self.set_isolated(false) {
            engine.close();
        }
    }

    pub(crate) fn attach(&self, engine: &Arc<CircuitEngine>) {
        let isolated = {
            let mut shared = self.shared.lock().expect(ERR_POISONED_LOCK);
            shared.engines.retain(|engine| engine.strong_count() > 0);
            shared.engines.push(Arc::downgrade(engine));
            shared.isolated
        };

        if isolated {
            engine.isolate();
        }
    }

    /// Updates the flag and returns the circuits that are still alive.
    ///
    /// The transitions run after the lock is released since they invoke telemetry listeners.
    fn set_isolated(&self, isolated: bool) -> Vec<Arc<CircuitEngine>> {
        let mut shared = self.shared.lock().expect(ERR_POISONED_LOCK);
        shared.isolated = isolated;
        shared.engines.retain(|engine| engine.strong_count() > 0);
        shared.engines.iter().filter_map(Weak::upgrade).collect()
    }
}
