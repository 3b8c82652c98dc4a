// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::Backoff;
use crate::retry::constants::{DEFAULT_BACKOFF, DEFAULT_BASE_DELAY, DEFAULT_USE_JITTER};
use crate::rnd::Rnd;

/// Width of the symmetric jitter window applied to constant and linear delays, relative to the delay.
const JITTER_FACTOR: f64 = 0.5;

/// Smooths the first delay produced by the decorrelated jitter curve.
const P_FACTOR: f64 = 4.0;

/// Scales the decorrelated jitter curve so that median delays land near 1, 2, 4, ... times the
/// base delay instead of 1.4, 2.8, 5.6, ...
const RP_SCALING: f64 = 1.0 / 1.4;

/// Backoff settings of one retry strategy.
#[derive(Debug, Clone)]
pub(crate) struct BackoffSchedule {
    pub backoff: Backoff,
    pub base_delay: Duration,
    pub max_delay: Option<Duration>,
    pub use_jitter: bool,
    pub rnd: Rnd,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_BACKOFF,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: None,
            use_jitter: DEFAULT_USE_JITTER,
            rnd: Rnd::default(),
        }
    }
}

impl BackoffSchedule {
    /// Returns the delays to wait before the first, second, ... retry of one execution.
    ///
    /// The iterator never ends; the retry strategy stops pulling when its attempts run out.
    pub fn delays(&self) -> Delays<'_> {
        Delays {
            schedule: self,
            retry: 0,
            curve_position: 0.0,
        }
    }

    fn delay_for(&self, retry: u32, curve_position: &mut f64) -> Duration {
        let delay = match self.backoff {
            Backoff::Constant => self.jittered(self.base_delay),
            Backoff::Linear => self.jittered(self.base_delay.saturating_mul(retry.saturating_add(1))),
            Backoff::Exponential if self.use_jitter => decorrelated_jitter(retry, self.base_delay, curve_position, &self.rnd),
            Backoff::Exponential => exponential(self.base_delay, retry),
        };

        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.use_jitter {
            symmetric_jitter(delay, &self.rnd)
        } else {
            delay
        }
    }
}

/// Infinite sequence of retry delays; see [`BackoffSchedule::delays`].
#[derive(Debug)]
pub(crate) struct Delays<'a> {
    schedule: &'a BackoffSchedule,
    retry: u32,
    // Position on the decorrelated jitter curve reached by the previous delay.
    curve_position: f64,
}

impl Iterator for Delays<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.schedule.base_delay.is_zero() {
            return Some(Duration::ZERO);
        }

        let delay = self.schedule.delay_for(self.retry, &mut self.curve_position);
        self.retry = self.retry.saturating_add(1);

        Some(delay)
    }
}

/// `base * 2^retry`, saturating at [`Duration::MAX`].
fn exponential(base: Duration, retry: u32) -> Duration {
    let factor = 2.0_f64.powi(i32::try_from(retry).unwrap_or(i32::MAX));
    saturating_secs(base.as_secs_f64() * factor)
}

/// Uniformly spreads `delay` over `[0.75 * delay, 1.25 * delay]`.
fn symmetric_jitter(delay: Duration, rnd: &Rnd) -> Duration {
    let ms = delay.as_secs_f64() * 1000.0;
    let window = ms * JITTER_FACTOR;
    let shifted = window.mul_add(rnd.next_f64(), -window / 2.0);

    saturating_secs((ms + shifted) / 1000.0)
}

/// Decorrelated jitter, second generation (Polly.Contrib.WaitAndRetry `DecorrelatedJitterBackoffV2`).
///
/// Each retry samples a random phase `t = retry + U[0, 1)` on the curve
/// `f(t) = 2^t * tanh(sqrt(P_FACTOR * t))` and waits for the distance travelled since the previous
/// sample. Consecutive delays are therefore only loosely correlated while their expected value
/// still doubles with every retry. The formula is credited to George Polevoy and was adapted by
/// Dylan Reisenberger for Polly.
fn decorrelated_jitter(retry: u32, base_delay: Duration, curve_position: &mut f64, rnd: &Rnd) -> Duration {
    let t = f64::from(retry) + rnd.next_f64();
    let next = t.exp2() * (P_FACTOR * t).sqrt().tanh();

    if !next.is_finite() {
        *curve_position = next;
        return Duration::MAX;
    }

    let travelled = next - *curve_position;
    *curve_position = next;

    saturating_secs(travelled * RP_SCALING * base_delay.as_secs_f64())
}

fn saturating_secs(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
