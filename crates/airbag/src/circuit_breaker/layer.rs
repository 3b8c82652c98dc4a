// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;
use tower_layer::Layer;

use super::constants::{DEFAULT_BREAK_DURATION, DEFAULT_FAILURE_THRESHOLD, DEFAULT_MIN_THROUGHPUT, DEFAULT_SAMPLING_DURATION};
use super::engine::{CircuitEngine, EngineOptions};
use super::{
    CircuitBreaker, CircuitBreakerManualControl, CircuitBreakerShared, CircuitBreakerStateProvider, OnCircuitClosedArgs,
    OnCircuitHalfOpenedArgs, OnCircuitOpenedArgs, OnClosed, OnHalfOpened, OnOpened, ShouldHandle,
};
use crate::config::CircuitBreakerConfig;
use crate::telemetry::TelemetryHelper;
use crate::{EnableIf, NotSet, Outcome, PipelineOptions, PredicateBuilder, Set};

/// Builder for the [`CircuitBreaker`] strategy.
///
/// Created by [`CircuitBreaker::layer`]. Which outcomes count as failures must be set through
/// [`handle`][CircuitBreakerLayer::handle] or [`should_handle`][CircuitBreakerLayer::should_handle]
/// before the layer implements [`Layer`].
///
/// Every service built by this layer owns a separate circuit. Clone the built service to share
/// one circuit between callers.
#[derive(Debug)]
pub struct CircuitBreakerLayer<In, Out, HandleState = Set> {
    clock: Clock,
    failure_threshold: f64,
    min_throughput: u32,
    sampling_duration: Duration,
    break_duration: Duration,
    should_handle: Option<ShouldHandle<Out>>,
    on_opened: Option<OnOpened<Out>>,
    on_closed: Option<OnClosed<Out>>,
    on_half_opened: Option<OnHalfOpened<In>>,
    manual_control: Option<CircuitBreakerManualControl>,
    state_provider: Option<CircuitBreakerStateProvider>,
    enable_if: EnableIf<In>,
    telemetry: TelemetryHelper,
    _state: PhantomData<fn(In, HandleState) -> Out>,
}

impl<In, Out> CircuitBreakerLayer<In, Out, NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, options: &PipelineOptions<In, Out>) -> Self {
        Self {
            clock: options.clock().clone(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            min_throughput: DEFAULT_MIN_THROUGHPUT,
            sampling_duration: DEFAULT_SAMPLING_DURATION,
            break_duration: DEFAULT_BREAK_DURATION,
            should_handle: None,
            on_opened: None,
            on_closed: None,
            on_half_opened: None,
            manual_control: None,
            state_provider: None,
            enable_if: EnableIf::always(),
            telemetry: options.create_telemetry(name),
            _state: PhantomData,
        }
    }
}

impl<In, Out, HandleState> CircuitBreakerLayer<In, Out, HandleState> {
    /// Sets the ratio of failed executions in the sampling window that breaks the circuit.
    ///
    /// **Default**: `0.1` (10 %)
    #[must_use]
    pub fn failure_threshold(mut self, threshold: f64) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets how many executions the sampling window must contain before the failure ratio is
    /// evaluated.
    ///
    /// **Default**: 100
    #[must_use]
    pub fn min_throughput(mut self, min_throughput: u32) -> Self {
        self.min_throughput = min_throughput;
        self
    }

    /// Sets the duration over which executions are sampled.
    ///
    /// **Default**: 30 seconds
    #[must_use]
    pub fn sampling_duration(mut self, duration: Duration) -> Self {
        self.sampling_duration = duration;
        self
    }

    /// Sets how long the circuit stays open before a trial is admitted.
    ///
    /// **Default**: 5 seconds
    #[must_use]
    pub fn break_duration(mut self, duration: Duration) -> Self {
        self.break_duration = duration;
        self
    }

    /// Decides which outcomes count as failures. All other outcomes count as successes,
    /// except cancellation, which is not recorded at all.
    #[must_use]
    pub fn should_handle(mut self, should_handle: impl Fn(&Out) -> bool + Send + Sync + 'static) -> CircuitBreakerLayer<In, Out, Set> {
        self.should_handle = Some(ShouldHandle::new(should_handle));
        self.into_state()
    }

    /// Invoked with the outcome that broke the circuit, or with the failed trial outcome that
    /// opened it again.
    #[must_use]
    pub fn on_opened(mut self, on_opened: impl Fn(&Out, OnCircuitOpenedArgs) + Send + Sync + 'static) -> Self {
        self.on_opened = Some(OnOpened::new(on_opened));
        self
    }

    /// Invoked with the successful trial outcome that closed the circuit.
    #[must_use]
    pub fn on_closed(mut self, on_closed: impl Fn(&Out, OnCircuitClosedArgs) + Send + Sync + 'static) -> Self {
        self.on_closed = Some(OnClosed::new(on_closed));
        self
    }

    /// Invoked with the input of the trial execution before it runs.
    #[must_use]
    pub fn on_half_opened(mut self, on_half_opened: impl Fn(&In, OnCircuitHalfOpenedArgs) + Send + Sync + 'static) -> Self {
        self.on_half_opened = Some(OnHalfOpened::new(on_half_opened));
        self
    }

    /// Lets `control` isolate and close the circuits built by this layer.
    #[must_use]
    pub fn manual_control(mut self, control: &CircuitBreakerManualControl) -> Self {
        self.manual_control = Some(control.clone());
        self
    }

    /// Lets `provider` observe the state of the first circuit built by this layer.
    #[must_use]
    pub fn state_provider(mut self, provider: &CircuitBreakerStateProvider) -> Self {
        self.state_provider = Some(provider.clone());
        self
    }

    /// Applies the strategy only to inputs for which `is_enabled` returns `true`. Other
    /// inputs bypass the circuit and are not recorded.
    #[must_use]
    pub fn enable_if(mut self, is_enabled: impl Fn(&In) -> bool + Send + Sync + 'static) -> Self {
        self.enable_if = EnableIf::new(is_enabled);
        self
    }

    /// Applies the strategy to every input.
    #[must_use]
    pub fn enable_always(mut self) -> Self {
        self.enable_if = EnableIf::always();
        self
    }

    /// Turns the strategy into a pass-through.
    #[must_use]
    pub fn disable(mut self) -> Self {
        self.enable_if = EnableIf::never();
        self
    }

    /// Applies validated configuration.
    #[must_use]
    pub fn config(self, config: &CircuitBreakerConfig) -> Self {
        let layer = self
            .failure_threshold(config.failure_threshold)
            .min_throughput(config.min_throughput)
            .sampling_duration(config.sampling_duration)
            .break_duration(config.break_duration);

        if config.enabled { layer.enable_always() } else { layer.disable() }
    }

    fn into_state<H>(self) -> CircuitBreakerLayer<In, Out, H> {
        CircuitBreakerLayer {
            clock: self.clock,
            failure_threshold: self.failure_threshold,
            min_throughput: self.min_throughput,
            sampling_duration: self.sampling_duration,
            break_duration: self.break_duration,
            should_handle: self.should_handle,
            on_opened: self.on_opened,
            on_closed: self.on_closed,
            on_half_opened: self.on_half_opened,
            manual_control: self.manual_control,
            state_provider: self.state_provider,
            enable_if: self.enable_if,
            telemetry: self.telemetry,
            _state: PhantomData,
        }
    }
}

impl<In, T, E, HandleState> CircuitBreakerLayer<In, Outcome<T, E>, HandleState>
where
    T: 'static,
    E: 'static,
{
    /// Counts the outcomes matched by a [`PredicateBuilder`] as failures.
    ///
    /// ```
    /// use airbag::circuit_breaker::CircuitBreaker;
    /// use airbag::{Outcome, PipelineOptions, PredicateBuilder};
    /// use tick::Clock;
    ///
    /// # fn example(clock: &Clock) {
    /// let options = PipelineOptions::<String, Outcome<u16, std::io::Error>>::new(clock);
    /// let layer = CircuitBreaker::layer("breaker", &options).handle(
    ///     PredicateBuilder::new()
    ///         .handle_result(|status: &u16| *status >= 500)
    ///         .handle_error(|_: &std::io::Error| true)
    ///         .handle_timeout(),
    /// );
    /// # let _ = layer;
    /// # }
    /// ```
    #[must_use]
    pub fn handle(self, predicate: PredicateBuilder<T, E>) -> CircuitBreakerLayer<In, Outcome<T, E>, Set> {
        let predicate = predicate.build();
        self.should_handle(move |outcome| predicate.should_handle(outcome))
    }
}

impl<In, Out, S> Layer<S> for CircuitBreakerLayer<In, Out, Set> {
    type Service = CircuitBreaker<In, Out, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let engine = Arc::new(CircuitEngine::new(
            EngineOptions {
                failure_threshold: self.failure_threshold,
                min_throughput: self.min_throughput,
                sampling_duration: self.sampling_duration,
                break_duration: self.break_duration,
            },
            self.clock.clone(),
            self.telemetry.clone(),
        ));

        if let Some(provider) = &self.state_provider {
            provider.attach(&engine);
        }

        if let Some(control) = &self.manual_control {
            control.attach(&engine);
        }

        let shared = CircuitBreakerShared {
            engine,
            should_handle: self.should_handle.clone().expect("should_handle must be set in Set state"),
            on_opened: self.on_opened.clone(),
            on_closed: self.on_closed.clone(),
            on_half_opened: self.on_half_opened.clone(),
            enable_if: self.enable_if.clone(),
        };

        CircuitBreaker {
            shared: Arc::new(shared),
            inner,
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use super::*;
    use crate::circuit_breaker::CircuitState;
    use tick::ClockControl;

    use crate::{Error, TimeoutRejected};

    type TestOutcome = Outcome<String, String>;

    fn options() -> PipelineOptions<String, TestOutcome> {
        PipelineOptions::new(ClockControl::new().to_clock()).name("test_pipeline")
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "Test")]
    fn new_has_defaults() {
        let layer = CircuitBreakerLayer::new("test_breaker".into(), &options());

        assert_eq!(layer.failure_threshold, 0.1);
        assert_eq!(layer.min_throughput, 100);
        assert_eq!(layer.sampling_duration, Duration::from_secs(30));
        assert_eq!(layer.break_duration, Duration::from_secs(5));
        assert!(layer.should_handle.is_none());
        assert!(layer.on_opened.is_none());
        assert!(layer.on_closed.is_none());
        assert!(layer.on_half_opened.is_none());
        assert!(layer.manual_control.is_none());
        assert!(layer.state_provider.is_none());
        assert!(layer.enable_if.call(&"input".to_string()));
        assert_eq!(layer.telemetry.strategy_name, "test_breaker");
        assert_eq!(layer.telemetry.pipeline_name, "test_pipeline");
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "Test")]
    fn setters_apply() {
        let layer = CircuitBreakerLayer::new("breaker".into(), &options())
            .failure_threshold(0.5)
            .min_throughput(10)
            .sampling_duration(Duration::from_secs(10))
            .break_duration(Duration::from_secs(1))
            .on_opened(|_, _| {})
            .on_closed(|_, _| {})
            .on_half_opened(|_, _| {})
            .manual_control(&CircuitBreakerManualControl::new())
            .state_provider(&CircuitBreakerStateProvider::new());

        assert_eq!(layer.failure_threshold, 0.5);
        assert_eq!(layer.min_throughput, 10);
        assert_eq!(layer.sampling_duration, Duration::from_secs(10));
        assert_eq!(layer.break_duration, Duration::from_secs(1));
        assert!(layer.on_opened.is_some());
        assert!(layer.on_closed.is_some());
        assert!(layer.on_half_opened.is_some());
        assert!(layer.manual_control.is_some());
        assert!(layer.state_provider.is_some());
    }

    #[test]
    fn handle_uses_predicate() {
        let layer = CircuitBreakerLayer::new("breaker".into(), &options()).handle(PredicateBuilder::new().handle_timeout());
        let should_handle = layer.should_handle.as_ref().unwrap();

        assert!(should_handle.call(&Err(TimeoutRejected::new(Duration::from_secs(1)).into())));
        assert!(!should_handle.call(&Err(Error::Operation("boom".to_string()))));
        assert!(!should_handle.call(&Ok("ok".to_string())));
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "Test")]
    fn config_applies() {
        let config = CircuitBreakerConfig {
            enabled: false,
            failure_threshold: 0.25,
            min_throughput: 20,
            sampling_duration: Duration::from_secs(60),
            break_duration: Duration::from_secs(15),
        };

        let layer = CircuitBreakerLayer::new("breaker".into(), &options()).config(&config);

        assert_eq!(layer.failure_threshold, 0.25);
        assert_eq!(layer.min_throughput, 20);
        assert_eq!(layer.sampling_duration, Duration::from_secs(60));
        assert_eq!(layer.break_duration, Duration::from_secs(15));
        assert!(!layer.enable_if.call(&"a".to_string()));
    }

    #[test]
    fn layer_attaches_control_and_provider() {
        let control = CircuitBreakerManualControl::new();
        let provider = CircuitBreakerStateProvider::new();

        let _service = CircuitBreakerLayer::new("breaker".into(), &options())
            .should_handle(|outcome: &TestOutcome| outcome.is_err())
            .manual_control(&control)
            .state_provider(&provider)
            .layer(());

        assert_eq!(provider.circuit_state(), Some(CircuitState::Closed));

        control.isolate();
        assert_eq!(provider.circuit_state(), Some(CircuitState::Isolated));
    }

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(CircuitBreakerLayer<String, TestOutcome, Set>: Layer<String>, Debug);
        static_assertions::assert_not_impl_any!(CircuitBreakerLayer<String, TestOutcome, NotSet>: Layer<String>);
    }
}
