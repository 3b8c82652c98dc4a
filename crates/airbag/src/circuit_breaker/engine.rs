// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tick::Clock;

use super::health::{ExecutionResult, HealthMetrics};
use super::{CircuitState, OnCircuitClosedArgs, OnCircuitHalfOpenedArgs, OnCircuitOpenedArgs};
use crate::constants::ERR_POISONED_LOCK;
use crate::telemetry::{ON_CIRCUIT_CLOSED, ON_CIRCUIT_HALF_OPENED, ON_CIRCUIT_OPENED, TelemetryHelper};
use crate::{BrokenCircuit, OutcomeKind, ResilienceContext, ResilienceEvent, ResilienceEventSeverity};

pub(crate) const OPENED_EVENT: ResilienceEvent = ResilienceEvent::new(ON_CIRCUIT_OPENED, ResilienceEventSeverity::Error);
pub(crate) const CLOSED_EVENT: ResilienceEvent = ResilienceEvent::new(ON_CIRCUIT_CLOSED, ResilienceEventSeverity::Information);
pub(crate) const HALF_OPENED_EVENT: ResilienceEvent = ResilienceEvent::new(ON_CIRCUIT_HALF_OPENED, ResilienceEventSeverity::Warning);

#[derive(Debug, Clone)]
pub(crate) struct EngineOptions {
    pub failure_threshold: f64,
    pub min_throughput: u32,
    pub sampling_duration: Duration,
    pub break_duration: Duration,
}

/// Result of asking the engine to admit an execution.
#[derive(Debug)]
pub(crate) enum Enter<'a> {
    Accepted {
        permit: Permit<'a>,
        /// Set when this execution moved the circuit from open to half-open.
        half_opened: Option<OnCircuitHalfOpenedArgs>,
    },
    Rejected(BrokenCircuit),
}

/// State change caused by recording an execution.
#[derive(Debug)]
pub(crate) enum Transition {
    Unchanged,
    Opened(OnCircuitOpenedArgs),
    Closed(OnCircuitClosedArgs),
}

/// Admission of one execution.
///
/// A permit for the half-open trial releases the trial slot when dropped without being
/// recorded, so an execution that is cancelled, panics or is dropped mid-flight does not keep
/// the circuit half-open forever.
#[derive(Debug)]
pub(crate) struct Permit<'a> {
    engine: &'a CircuitEngine,
    trial: Option<u64>,
}

impl Permit<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial.is_some()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.trial.take() {
            self.engine.release_trial(id);
        }
    }
}

/// The circuit state machine shared by every clone of one circuit breaker service.
///
/// All transitions happen under a single lock, so concurrent executions observe a consistent
/// state and at most one trial is admitted while the circuit is half-open.
#[derive(Debug)]
pub(crate) struct CircuitEngine {
    inner: Mutex<Inner>,
    options: EngineOptions,
    clock: Clock,
    telemetry: TelemetryHelper,
}

#[derive(Debug)]
struct Inner {
    state: State,
    next_trial_id: u64,
}

#[derive(Debug)]
enum State {
    Closed { health: HealthMetrics },
    Open { opened_at: Instant, open_until: Instant },
    HalfOpen { opened_at: Instant, trial: Option<Trial> },
    Isolated { opened_at: Instant },
}

#[derive(Debug, Clone, Copy)]
struct Trial {
    id: u64,
    started_at: Instant,
}

impl CircuitEngine {
    pub fn new(options: EngineOptions, clock: Clock, telemetry: TelemetryHelper) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed {
                    health: HealthMetrics::new(options.sampling_duration),
                },
                next_trial_id: 0,
            }),
            options,
            clock,
            telemetry,
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.inner.lock().expect(ERR_POISONED_LOCK).state {
            State::Closed { .. } => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
            State::Isolated { .. } => CircuitState::Isolated,
        }
    }

    pub fn enter(&self) -> Enter<'_> {
        // NOTE: read the clock outside of the lock.
        let now = self.clock.instant();
        let mut guard = self.inner.lock().expect(ERR_POISONED_LOCK);
        let inner = &mut *guard;
        let break_duration = self.options.break_duration;

        match inner.state {
            State::Closed { .. } => Enter::Accepted {
                permit: Permit { engine: self, trial: None },
                half_opened: None,
            },
            State::Open { opened_at, open_until } if now >= open_until => {
                let id = inner.take_trial_id();
                inner.state = State::HalfOpen {
                    opened_at,
                    trial: Some(Trial { id, started_at: now }),
                };

                Enter::Accepted {
                    permit: Permit { engine: self, trial: Some(id) },
                    half_opened: Some(OnCircuitHalfOpenedArgs {
                        open_duration: now.saturating_duration_since(opened_at),
                    }),
                }
            }
            State::Open { open_until, .. } => Enter::Rejected(BrokenCircuit::new(Some(open_until.saturating_duration_since(now)), false)),
            State::HalfOpen { opened_at, trial } => match trial {
                // A trial that outlived the break duration is presumed lost.
                Some(trial) if now.saturating_duration_since(trial.started_at) < break_duration => Enter::Rejected(BrokenCircuit::new(
                    Some((trial.started_at + break_duration).saturating_duration_since(now)),
                    false,
                )),
                _ => {
                    let id = inner.take_trial_id();
                    inner.state = State::HalfOpen {
                        opened_at,
                        trial: Some(Trial { id, started_at: now }),
                    };

                    Enter::Accepted {
                        permit: Permit { engine: self, trial: Some(id) },
                        half_opened: None,
                    }
                }
            },
            State::Isolated { .. } => Enter::Rejected(BrokenCircuit::new(None, true)),
        }
    }

    pub fn exit(&self, mut permit: Permit<'_>, result: ExecutionResult) -> Transition {
        let trial_id = permit.trial.take();
        let now = self.clock.instant();
        let mut guard = self.inner.lock().expect(ERR_POISONED_LOCK);
        let inner = &mut *guard;

        match &mut inner.state {
            State::Closed { health } => {
                health.record(result, now);

                if result == ExecutionResult::Success {
                    return Transition::Unchanged;
                }

                let health = health.health_info(now);
                if !health.is_unhealthy(self.options.failure_threshold, self.options.min_throughput) {
                    return Transition::Unchanged;
                }

                inner.state = State::Open {
                    opened_at: now,
                    open_until: now + self.options.break_duration,
                };

                Transition::Opened(OnCircuitOpenedArgs {
                    break_duration: self.options.break_duration,
                    is_manual: false,
                    health: Some(health),
                })
            }
            State::HalfOpen {
                opened_at,
                trial: Some(current),
            } if trial_id == Some(current.id) => {
                let opened_at = *opened_at;

                match result {
                    ExecutionResult::Success => {
                        inner.state = State::Closed {
                            health: HealthMetrics::new(self.options.sampling_duration),
                        };

                        Transition::Closed(OnCircuitClosedArgs {
                            is_manual: false,
                            open_duration: now.saturating_duration_since(opened_at),
                        })
                    }
                    ExecutionResult::Failure => {
                        inner.state = State::Open {
                            opened_at,
                            open_until: now + self.options.break_duration,
                        };

                        Transition::Opened(OnCircuitOpenedArgs {
                            break_duration: self.options.break_duration,
                            is_manual: false,
                            health: None,
                        })
                    }
                }
            }
            // Executions admitted before the circuit broke, and stale trials, finish while the
            // state has already moved on. Their results are not relevant anymore.
            State::Open { .. } | State::HalfOpen { .. } | State::Isolated { .. } => Transition::Unchanged,
        }
    }

    /// Holds the circuit open until [`close`][Self::close] is called.
    pub fn isolate(&self) {
        let now = self.clock.instant();
        {
            let mut inner = self.inner.lock().expect(ERR_POISONED_LOCK);
            let opened_at = match inner.state {
                State::Isolated { .. } => return,
                State::Closed { .. } => now,
                State::Open { opened_at, .. } | State::HalfOpen { opened_at, .. } => opened_at,
            };
            inner.state = State::Isolated { opened_at };
        }

        self.report_opened(
            None,
            None,
            &OnCircuitOpenedArgs {
                break_duration: Duration::MAX,
                is_manual: true,
                health: None,
            },
        );
    }

    /// Resets the circuit to closed with empty health metrics.
    pub fn close(&self) {
        let now = self.clock.instant();
        let opened_at = {
            let mut inner = self.inner.lock().expect(ERR_POISONED_LOCK);
            let opened_at = match inner.state {
                State::Closed { .. } => None,
                State::Open { opened_at, .. } | State::HalfOpen { opened_at, .. } | State::Isolated { opened_at } => Some(opened_at),
            };
            inner.state = State::Closed {
                health: HealthMetrics::new(self.options.sampling_duration),
            };
            opened_at
        };

        if let Some(opened_at) = opened_at {
            self.report_closed(
                None,
                None,
                &OnCircuitClosedArgs {
                    is_manual: true,
                    open_duration: now.saturating_duration_since(opened_at),
                },
            );
        }
    }

    fn release_trial(&self, id: u64) {
        let mut inner = self.inner.lock().expect(ERR_POISONED_LOCK);

        if let State::HalfOpen { trial, .. } = &mut inner.state
            && trial.is_some_and(|p| p.id == id)
        {
            *trial = None;
        }
    }

    pub fn report_opened(&self, context: Option<&mut ResilienceContext>, outcome: Option<OutcomeKind>, args: &OnCircuitOpenedArgs) {
        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            let (failure_rate, throughput) = args.health.map_or((0.0, 0), |h| (h.failure_rate(), h.throughput()));

            tracing::event!(
                name: "airbag.circuit_breaker.opened",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                circuit_breaker.state = CircuitState::Open.as_str(),
                circuit_breaker.manual = args.is_manual,
                circuit_breaker.break_duration = args.break_duration.as_secs_f32(),
                circuit_breaker.health.failure_rate = failure_rate,
                circuit_breaker.health.throughput = throughput,
            );
        }

        self.report_metrics(ON_CIRCUIT_OPENED, CircuitState::Open);
        self.report(context, OPENED_EVENT, outcome, args);
    }

    pub fn report_closed(&self, context: Option<&mut ResilienceContext>, outcome: Option<OutcomeKind>, args: &OnCircuitClosedArgs) {
        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.circuit_breaker.closed",
                tracing::Level::INFO,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                circuit_breaker.state = CircuitState::Closed.as_str(),
                circuit_breaker.manual = args.is_manual,
                circuit_breaker.open.duration = args.open_duration.as_secs_f32(),
            );
        }

        self.report_metrics(ON_CIRCUIT_CLOSED, CircuitState::Closed);
        self.report(context, CLOSED_EVENT, outcome, args);
    }

    pub fn report_half_opened(&self, context: &mut ResilienceContext, args: &OnCircuitHalfOpenedArgs) {
        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.circuit_breaker.half_opened",
                tracing::Level::INFO,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                circuit_breaker.state = CircuitState::HalfOpen.as_str(),
                circuit_breaker.open.duration = args.open_duration.as_secs_f32(),
            );
        }

        self.report_metrics(ON_CIRCUIT_HALF_OPENED, CircuitState::HalfOpen);
        self.report(Some(context), HALF_OPENED_EVENT, None, args);
    }

    #[cfg_attr(
        not(any(feature = "logs", test)),
        expect(unused_variables, clippy::unused_self, reason = "unused when logs are disabled")
    )]
    pub fn report_rejected(&self, rejection: &BrokenCircuit) {
        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            let state = if rejection.is_isolated() {
                CircuitState::Isolated
            } else {
                CircuitState::Open
            };

            tracing::event!(
                name: "airbag.circuit_breaker.rejected",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                circuit_breaker.state = state.as_str(),
            );
        }
    }

    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, clippy::unused_self, reason = "unused when metrics are disabled")
    )]
    fn report_metrics(&self, event_name: &'static str, state: CircuitState) {
        #[cfg(any(feature = "metrics", test))]
        if self.telemetry.metrics_enabled() {
            use opentelemetry::KeyValue;

            use super::constants::CIRCUIT_STATE;

            self.telemetry.report_metrics(event_name, &[KeyValue::new(CIRCUIT_STATE, state.as_str())]);
        }
    }

    fn report(&self, context: Option<&mut ResilienceContext>, event: ResilienceEvent, outcome: Option<OutcomeKind>, args: &dyn std::any::Any) {
        match context {
            Some(context) => self.telemetry.report(context, event, outcome, args),
            None => self.telemetry.report_detached(event, args),
        }
    }
}

impl Inner {
    fn take_trial_id(&mut self) -> u64 {
        let id = self.next_trial_id;
        self.next_trial_id = self.next_trial_id.wrapping_add(1);
        id
    }
}
