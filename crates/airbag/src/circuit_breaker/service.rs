// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::ControlFlow;
use std::sync::Arc;

use super::engine::{CircuitEngine, Enter, Permit, Transition};
use super::health::ExecutionResult;
use super::{CircuitBreakerLayer, OnClosed, OnHalfOpened, OnOpened, ShouldHandle};
use crate::{EnableIf, Error, NotSet, Outcome, OutcomeKind, PipelineOptions, ResilienceContext, Service};

/// Stops calling the inner service while it keeps failing.
///
/// The strategy samples the outcomes of the inner service. Once the sampling window holds at
/// least the minimum throughput and the ratio of failures reaches the failure threshold, the
/// circuit opens and every execution is rejected with
/// [`BrokenCircuit`][crate::BrokenCircuit] without calling the inner service. After the break
/// duration a single trial execution is admitted: success closes the circuit, failure opens it
/// again. Executions arriving while the trial runs are rejected.
///
/// Cancelled executions are neither counted as successes nor as failures, and a cancelled trial
/// frees the trial slot for the next execution.
///
/// ```
/// use std::time::Duration;
///
/// use airbag::circuit_breaker::CircuitBreaker;
/// use airbag::{Error, Execute, Outcome, PipelineOptions, PredicateBuilder, ResilienceContext, Stack};
/// use tick::Clock;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let options = PipelineOptions::<(), Outcome<(), String>>::new(Clock::new_tokio());
///
/// let pipeline = (
///     CircuitBreaker::layer("breaker", &options)
///         .handle(PredicateBuilder::new().handle_error(|_: &String| true))
///         .failure_threshold(0.5)
///         .min_throughput(2)
///         .break_duration(Duration::from_secs(10)),
///     Execute::new(|_ctx: &mut ResilienceContext, ()| async { Err::<(), _>(Error::Operation("down".to_string())) }),
/// )
///     .into_pipeline();
///
/// let _ = pipeline.execute(()).await;
/// let _ = pipeline.execute(()).await;
///
/// let error = pipeline.execute(()).await.unwrap_err();
/// assert!(error.as_broken_circuit().is_some());
/// # }
/// ```
#[derive(Debug)]
pub struct CircuitBreaker<In, Out, S> {
    pub(super) shared: Arc<CircuitBreakerShared<In, Out>>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct CircuitBreakerShared<In, Out> {
    pub(crate) engine: Arc<CircuitEngine>,
    pub(crate) should_handle: ShouldHandle<Out>,
    pub(crate) on_opened: Option<OnOpened<Out>>,
    pub(crate) on_closed: Option<OnClosed<Out>>,
    pub(crate) on_half_opened: Option<OnHalfOpened<In>>,
    pub(crate) enable_if: EnableIf<In>,
}

impl<In, Out, S: Clone> Clone for CircuitBreaker<In, Out, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl<In, Out> CircuitBreaker<In, Out, ()> {
    /// Starts building a circuit breaker named `name`.
    pub fn layer(name: impl Into<std::borrow::Cow<'static, str>>, options: &PipelineOptions<In, Out>) -> CircuitBreakerLayer<In, Out, NotSet> {
        CircuitBreakerLayer::new(name.into(), options)
    }
}

impl<In, T, E, S> Service<In> for CircuitBreaker<In, Outcome<T, E>, S>
where
    In: Send,
    T: Send,
    E: Send,
    S: Service<In, Out = Outcome<T, E>>,
{
    type Out = Outcome<T, E>;

    async fn execute(&self, context: &mut ResilienceContext, input: In) -> Self::Out {
        if !self.shared.enable_if.call(&input) {
            return self.inner.execute(context, input).await;
        }

        if context.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let permit = match self.shared.before_execute(context, &input) {
            ControlFlow::Continue(permit) => permit,
            ControlFlow::Break(out) => return out,
        };

        let out = self.inner.execute(context, input).await;

        self.shared.after_execute(context, permit, &out);

        out
    }
}

impl<In, T, E> CircuitBreakerShared<In, Outcome<T, E>> {
    fn before_execute(&self, context: &mut ResilienceContext, input: &In) -> ControlFlow<Outcome<T, E>, Permit<'_>> {
        match self.engine.enter() {
            Enter::Accepted { permit, half_opened } => {
                if let Some(args) = half_opened {
                    self.engine.report_half_opened(context, &args);

                    if let Some(on_half_opened) = &self.on_half_opened {
                        on_half_opened.call(input, args);
                    }
                }

                ControlFlow::Continue(permit)
            }
            Enter::Rejected(rejection) => {
                self.engine.report_rejected(&rejection);
                ControlFlow::Break(Err(rejection.into()))
            }
        }
    }

    fn after_execute(&self, context: &mut ResilienceContext, permit: Permit<'_>, out: &Outcome<T, E>) {
        // Dropping the permit releases a trial without recording anything.
        if matches!(out, Err(Error::Cancelled)) {
            return;
        }

        let result = if self.should_handle.call(out) {
            ExecutionResult::Failure
        } else {
            ExecutionResult::Success
        };

        match self.engine.exit(permit, result) {
            Transition::Unchanged => {}
            Transition::Opened(args) => {
                self.engine.report_opened(Some(context), Some(OutcomeKind::of(out)), &args);

                if let Some(on_opened) = &self.on_opened {
                    on_opened.call(out, args);
                }
            }
            Transition::Closed(args) => {
                self.engine.report_closed(Some(context), Some(OutcomeKind::of(out)), &args);

                if let Some(on_closed) = &self.on_closed {
                    on_closed.call(out, args);
                }
            }
        }
    }
}
