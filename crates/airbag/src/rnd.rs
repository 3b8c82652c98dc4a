// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

/// Source of randomness for jitter.
///
/// Not cryptographically secure. Tests swap in a deterministic sequence so that jittered delays
/// can be asserted exactly.
#[derive(Clone, Default)]
pub(crate) enum Rnd {
    #[default]
    Real,

    #[cfg(test)]
    Test(std::sync::Arc<dyn Fn() -> f64 + Send + Sync>),
}

impl Debug for Rnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => write!(f, "Real"),
            #[cfg(test)]
            Self::Test(_) => write!(f, "Test"),
        }
    }
}

impl Rnd {
    #[cfg(test)]
    pub fn new_fixed(value: f64) -> Self {
        Self::Test(std::sync::Arc::new(move || value))
    }

    /// Replays `values` in order, wrapping around once exhausted.
    #[cfg(test)]
    pub fn new_sequence(values: Vec<f64>) -> Self {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let index = AtomicUsize::new(0);
        Self::Test(std::sync::Arc::new(move || {
            let i = index.fetch_add(1, Ordering::Relaxed);
            values[i % values.len()]
        }))
    }

    /// Returns a value in `[0, 1)`.
    pub fn next_f64(&self) -> f64 {
        match self {
            Self::Real => fastrand::f64(),
            #[cfg(test)]
            Self::Test(generator) => generator(),
        }
    }
}
