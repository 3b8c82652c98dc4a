// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::constants::{NUMBER_OF_WINDOWS, WINDOW_RESOLUTION};

/// Whether a recorded execution counts as a success or as a failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ExecutionResult {
    Success,
    Failure,
}

/// Failure statistics of the sampling window.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HealthInfo {
    throughput: u32,
    failure_count: u32,
    failure_rate: f64,
}

impl HealthInfo {
    pub(crate) fn new(successes: u32, failures: u32) -> Self {
        let throughput = successes.saturating_add(failures);

        if throughput == 0 {
            return Self {
                throughput: 0,
                failure_count: 0,
                failure_rate: 0.0,
            };
        }

        Self {
            throughput,
            failure_count: failures,
            failure_rate: f64::from(failures) / f64::from(throughput),
        }
    }

    /// Number of executions recorded in the sampling window.
    #[must_use]
    pub fn throughput(&self) -> u32 {
        self.throughput
    }

    /// Number of failed executions recorded in the sampling window.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Ratio of failed executions, between `0.0` and `1.0`.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    pub(crate) fn is_unhealthy(&self, failure_threshold: f64, min_throughput: u32) -> bool {
        self.throughput >= min_throughput && self.failure_rate >= failure_threshold
    }
}

/// Tracks execution results over the sampling duration.
///
/// Short sampling durations are tracked as one window that resets once it has elapsed.
/// Longer ones are split into [`NUMBER_OF_WINDOWS`] sub-windows that expire one by one, which
/// approximates a sliding window without storing individual executions.
#[derive(Debug)]
pub(crate) enum HealthMetrics {
    Single(SingleWindow),
    Rolling(RollingWindows),
}

impl HealthMetrics {
    pub fn new(sampling_duration: Duration) -> Self {
        if sampling_duration < WINDOW_RESOLUTION * NUMBER_OF_WINDOWS {
            Self::Single(SingleWindow::new(sampling_duration))
        } else {
            Self::Rolling(RollingWindows::new(sampling_duration))
        }
    }

    pub fn record(&mut self, result: ExecutionResult, now: Instant) {
        match self {
            Self::Single(single) => single.record(result, now),
            Self::Rolling(rolling) => rolling.record(result, now),
        }
    }

    pub fn health_info(&mut self, now: Instant) -> HealthInfo {
        match self {
            Self::Single(single) => single.health_info(now),
            Self::Rolling(rolling) => rolling.health_info(now),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SingleWindow {
    sampling_duration: Duration,
    window: Option<Window>,
}

impl SingleWindow {
    fn new(sampling_duration: Duration) -> Self {
        Self {
            sampling_duration,
            window: None,
        }
    }

    fn record(&mut self, result: ExecutionResult, now: Instant) {
        self.expire(now);
        self.window.get_or_insert_with(|| Window::new(now)).update(result);
    }

    fn health_info(&mut self, now: Instant) -> HealthInfo {
        self.expire(now);
        self.window
            .as_ref()
            .map_or_else(|| HealthInfo::new(0, 0), |w| HealthInfo::new(w.successes, w.failures))
    }

    fn expire(&mut self, now: Instant) {
        if self
            .window
            .as_ref()
            .is_some_and(|w| now.saturating_duration_since(w.started_at) >= self.sampling_duration)
        {
            self.window = None;
        }
    }
}

#[derive(Debug)]
pub(crate) struct RollingWindows {
    sampling_duration: Duration,
    window_duration: Duration,
    windows: VecDeque<Window>,
}

impl RollingWindows {
    fn new(sampling_duration: Duration) -> Self {
        Self {
            sampling_duration,
            window_duration: sampling_duration / NUMBER_OF_WINDOWS,
            windows: VecDeque::with_capacity(NUMBER_OF_WINDOWS as usize + 1),
        }
    }

    fn record(&mut self, result: ExecutionResult, now: Instant) {
        self.evict(now);

        if let Some(back) = self.windows.back_mut()
            && now.saturating_duration_since(back.started_at) < self.window_duration
        {
            back.update(result);
        } else {
            let mut window = Window::new(now);
            window.update(result);
            self.windows.push_back(window);
        }
    }

    fn health_info(&mut self, now: Instant) -> HealthInfo {
        self.evict(now);

        let (successes, failures) = self.windows.iter().fold((0_u32, 0_u32), |(s, f), w| {
            (s.saturating_add(w.successes), f.saturating_add(w.failures))
        });

        HealthInfo::new(successes, failures)
    }

    #[cfg_attr(test, mutants::skip)] // an always-true condition loops until the queue is empty anyway
    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.windows.front()
            && now.saturating_duration_since(front.started_at) >= self.sampling_duration
        {
            self.windows.pop_front();
        }
    }
}

#[derive(Debug)]
struct Window {
    successes: u32,
    failures: u32,
    started_at: Instant,
}

impl Window {
    fn new(started_at: Instant) -> Self {
        Self {
            successes: 0,
            failures: 0,
            started_at,
        }
    }

    fn update(&mut self, result: ExecutionResult) {
        match result {
            ExecutionResult::Success => self.successes = self.successes.saturating_add(1),
            ExecutionResult::Failure => self.failures = self.failures.saturating_add(1),
        }
    }
}
