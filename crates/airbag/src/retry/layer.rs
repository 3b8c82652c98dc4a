// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;
use tower_layer::Layer;

use super::backoff::BackoffSchedule;
use super::constants::DEFAULT_RETRY_ATTEMPTS;
use super::{CloneArgs, CloneInput, DelayGenerator, DelayGeneratorArgs, OnRetry, OnRetryArgs, Retry, RetryShared, ShouldRetry, ShouldRetryArgs};
use crate::config::RetryConfig;
use crate::options::MaxAttempts;
use crate::telemetry::TelemetryHelper;
use crate::{Backoff, EnableIf, NotSet, Outcome, PipelineOptions, PredicateBuilder, Set};

/// Builder for the [`Retry`] strategy.
///
/// Created by [`Retry::layer`]. Two properties are required and enforced at compile time
/// through the type state: how to clone the input for another attempt
/// ([`clone_input`][RetryLayer::clone_input] or [`clone_input_with`][RetryLayer::clone_input_with])
/// and which outcomes to retry ([`handle`][RetryLayer::handle] or
/// [`should_handle`][RetryLayer::should_handle]). Only a layer with both set implements
/// [`Layer`].
#[derive(Debug)]
pub struct RetryLayer<In, Out, CloneInputState = Set, HandleState = Set> {
    clock: Clock,
    max_attempts: MaxAttempts,
    backoff: BackoffSchedule,
    clone_input: Option<CloneInput<In>>,
    should_retry: Option<ShouldRetry<Out>>,
    delay_generator: Option<DelayGenerator<Out>>,
    on_retry: Option<OnRetry<Out>>,
    enable_if: EnableIf<In>,
    telemetry: TelemetryHelper,
    _state: PhantomData<fn(In, CloneInputState, HandleState) -> Out>,
}

impl<In, Out> RetryLayer<In, Out, NotSet, NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, options: &PipelineOptions<In, Out>) -> Self {
        Self {
            clock: options.clock().clone(),
            max_attempts: MaxAttempts::from_retries(DEFAULT_RETRY_ATTEMPTS),
            backoff: BackoffSchedule::default(),
            clone_input: None,
            should_retry: None,
            delay_generator: None,
            on_retry: None,
            enable_if: EnableIf::always(),
            telemetry: options.create_telemetry(name),
            _state: PhantomData,
        }
    }
}

impl<In, Out, CloneInputState, HandleState> RetryLayer<In, Out, CloneInputState, HandleState> {
    /// Sets how many times the operation is retried after the initial call.
    ///
    /// `0` disables retries: the operation runs exactly once.
    ///
    /// **Default**: 3
    #[must_use]
    pub fn max_retry_attempts(mut self, retries: u32) -> Self {
        self.max_attempts = MaxAttempts::from_retries(retries);
        self
    }

    /// Retries until the outcome is no longer handled or the execution is cancelled.
    #[must_use]
    pub fn infinite_retry_attempts(mut self) -> Self {
        self.max_attempts = MaxAttempts::Infinite;
        self
    }

    /// Sets the shape of the delay schedule.
    ///
    /// **Default**: [`Backoff::Exponential`]
    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff.backoff = backoff;
        self
    }

    /// Sets the delay the backoff schedule is derived from.
    ///
    /// **Default**: 2 seconds
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.backoff.base_delay = delay;
        self
    }

    /// Caps every computed delay.
    ///
    /// **Default**: no cap
    #[must_use]
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.backoff.max_delay = Some(max_delay);
        self
    }

    /// Randomizes delays so that many clients failing together do not retry in lockstep.
    ///
    /// Constant and linear delays are spread by +/-25 %. Exponential delays use decorrelated
    /// jitter, which keeps the doubling trend while decorrelating consecutive delays.
    ///
    /// **Default**: `true`
    #[must_use]
    pub fn use_jitter(mut self, use_jitter: bool) -> Self {
        self.backoff.use_jitter = use_jitter;
        self
    }

    /// Overrides the computed delay for selected outcomes, for example to honor a server's
    /// `Retry-After` hint.
    ///
    /// Returning `None` keeps the backoff delay, which is available through
    /// [`DelayGeneratorArgs::backoff_delay`].
    #[must_use]
    pub fn delay_generator(mut self, generator: impl Fn(&Out, DelayGeneratorArgs) -> Option<Duration> + Send + Sync + 'static) -> Self {
        self.delay_generator = Some(DelayGenerator::new(generator));
        self
    }

    /// Invoked before every retry, after the delay has been decided.
    #[must_use]
    pub fn on_retry(mut self, on_retry: impl Fn(&Out, OnRetryArgs) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(OnRetry::new(on_retry));
        self
    }

    /// Sets how the input is cloned for the next attempt.
    ///
    /// Each attempt consumes its input, so the strategy keeps the original and hands a copy to
    /// the inner service. Returning `None` stops retrying: the current attempt receives the
    /// original input and its outcome is final.
    #[must_use]
    pub fn clone_input_with(
        mut self,
        clone: impl Fn(&mut In, CloneArgs) -> Option<In> + Send + Sync + 'static,
    ) -> RetryLayer<In, Out, Set, HandleState> {
        self.clone_input = Some(CloneInput::new(clone));
        self.into_state()
    }

    /// Clones the input with its [`Clone`] implementation.
    #[must_use]
    pub fn clone_input(self) -> RetryLayer<In, Out, Set, HandleState>
    where
        In: Clone,
    {
        self.clone_input_with(|input, _args| Some(input.clone()))
    }

    /// Decides which outcomes are retried.
    #[must_use]
    pub fn should_handle(
        mut self,
        should_retry: impl Fn(&Out, ShouldRetryArgs) -> bool + Send + Sync + 'static,
    ) -> RetryLayer<In, Out, CloneInputState, Set> {
        self.should_retry = Some(ShouldRetry::new(should_retry));
        self.into_state()
    }

    /// Applies the strategy only to inputs for which `is_enabled` returns `true`; other inputs
    /// go straight to the inner service.
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
    pub fn config(self, config: &RetryConfig) -> Self {
        let mut layer = self
            .max_retry_attempts(config.max_retry_attempts)
            .backoff(config.backoff)
            .base_delay(config.base_delay)
            .use_jitter(config.use_jitter);

        layer.backoff.max_delay = config.max_delay;

        if config.enabled { layer.enable_always() } else { layer.disable() }
    }

    fn into_state<C, H>(self) -> RetryLayer<In, Out, C, H> {
        RetryLayer {
            clock: self.clock,
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            clone_input: self.clone_input,
            should_retry: self.should_retry,
            delay_generator: self.delay_generator,
            on_retry: self.on_retry,
            enable_if: self.enable_if,
            telemetry: self.telemetry,
            _state: PhantomData,
        }
    }

    #[cfg(test)]
    pub(super) fn set_rnd(mut self, rnd: crate::rnd::Rnd) -> Self {
        self.backoff.rnd = rnd;
        self
    }
}

impl<In, T, E, CloneInputState, HandleState> RetryLayer<In, Outcome<T, E>, CloneInputState, HandleState>
where
    T: 'static,
    E: 'static,
{
    /// Retries the outcomes matched by a [`PredicateBuilder`].
    ///
    /// ```
    /// use airbag::retry::Retry;
    /// use airbag::{Outcome, PipelineOptions, PredicateBuilder};
    /// use tick::Clock;
    ///
    /// # fn example(clock: &Clock) {
    /// let options = PipelineOptions::<String, Outcome<u16, std::io::Error>>::new(clock);
    /// let layer = Retry::layer("retry", &options).clone_input().handle(
    ///     PredicateBuilder::new()
    ///         .handle_result(|status: &u16| *status == 503)
    ///         .handle_timeout(),
    /// );
    /// # let _ = layer;
    /// # }
    /// ```
    #[must_use]
    pub fn handle(self, predicate: PredicateBuilder<T, E>) -> RetryLayer<In, Outcome<T, E>, CloneInputState, Set> {
        let predicate = predicate.build();
        self.should_handle(move |outcome, _args| predicate.should_handle(outcome))
    }
}

impl<In, Out, S> Layer<S> for RetryLayer<In, Out, Set, Set> {
    type Service = Retry<In, Out, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let shared = RetryShared {
            clock: self.clock.clone(),
            max_attempts: self.max_attempts,
            backoff: self.backoff.clone(),
            clone_input: self.clone_input.clone().expect("clone_input must be set in Set state"),
            should_retry: self.should_retry.clone().expect("should_retry must be set in Set state"),
            delay_generator: self.delay_generator.clone(),
            on_retry: self.on_retry.clone(),
            enable_if: self.enable_if.clone(),
            telemetry: self.telemetry.clone(),
        };

        Retry {
            shared: Arc::new(shared),
            inner,
        }
    }
}
