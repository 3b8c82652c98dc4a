// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{Either, select};
use tick::Clock;
use tokio_util::sync::CancellationToken;

use super::watchdog::Watchdog;
use super::{OnTimeout, OnTimeoutArgs, TimeoutGenerator, TimeoutGeneratorArgs, TimeoutLayer};
use crate::context::CancellationScope;
use crate::telemetry::{ON_TIMEOUT, TelemetryHelper};
use crate::{
    EnableIf, Error, Outcome, OutcomeKind, PipelineOptions, ResilienceContext, ResilienceEvent, ResilienceEventSeverity, Service,
    TimeoutRejected,
};

const TIMEOUT_EVENT: ResilienceEvent = ResilienceEvent::new(ON_TIMEOUT, ResilienceEventSeverity::Error);

/// Bounds the time an execution of the inner service may take.
///
/// For the duration of the inner call the context carries a token derived from the caller's
/// token, which the strategy cancels when the timeout elapses. The caller's token is restored
/// on every exit path.
///
/// - Asynchronous executions race the inner future against the timer and drop it on timeout.
/// - Synchronous executions cannot be interrupted. The derived token is cancelled at the
///   deadline and the operation is expected to observe it and return [`Error::Cancelled`].
///
/// A timeout yields [`TimeoutRejected`] carrying the timeout. Cancellation by the caller is
/// never reported as a timeout: it surfaces as [`Error::Cancelled`], and an execution whose
/// token was already cancelled does not call the inner service at all.
///
/// ```
/// use std::time::Duration;
///
/// use airbag::timeout::Timeout;
/// use airbag::{Execute, Outcome, PipelineOptions, ResilienceContext, Stack};
/// use tick::Clock;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let clock = Clock::new_tokio();
/// let options = PipelineOptions::<(), Outcome<(), String>>::new(&clock);
///
/// let pipeline = (
///     Timeout::layer("timeout", &options).timeout(Duration::from_millis(50)),
///     Execute::new(move |_ctx: &mut ResilienceContext, ()| {
///         let clock = clock.clone();
///         async move {
///             clock.delay(Duration::from_secs(1)).await;
///             Ok(())
///         }
///     }),
/// )
///     .into_pipeline();
///
/// let error = pipeline.execute(()).await.unwrap_err();
/// assert_eq!(error.as_timeout().map(|t| t.timeout()), Some(Duration::from_millis(50)));
/// # }
/// ```
#[derive(Debug)]
pub struct Timeout<In, Out, S> {
    pub(super) shared: Arc<TimeoutShared<In, Out>>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct TimeoutShared<In, Out> {
    pub(crate) clock: Clock,
    pub(crate) timeout: Duration,
    pub(crate) timeout_generator: Option<TimeoutGenerator<In>>,
    pub(crate) on_timeout: Option<OnTimeout<Out>>,
    pub(crate) enable_if: EnableIf<In>,
    pub(crate) telemetry: TelemetryHelper,
}

impl<In, Out, S: Clone> Clone for Timeout<In, Out, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl<In, Out> Timeout<In, Out, ()> {
    /// Starts building a timeout strategy named `name`.
    pub fn layer(name: impl Into<Cow<'static, str>>, options: &PipelineOptions<In, Out>) -> TimeoutLayer<In, Out> {
        TimeoutLayer::new(name.into(), options)
    }
}

impl<In, T, E, S> Service<In> for Timeout<In, Outcome<T, E>, S>
where
    In: Send,
    T: Send,
    E: Send,
    S: Service<In, Out = Outcome<T, E>>,
{
    type Out = Outcome<T, E>;

    #[cfg_attr(test, mutants::skip)] // causes test timeouts
    async fn execute(&self, context: &mut ResilienceContext, input: In) -> Self::Out {
        let shared = &*self.shared;

        if !shared.enable_if.call(&input) {
            return self.inner.execute(context, input).await;
        }

        let timeout = shared.timeout_for(&input);
        if timeout.is_zero() || timeout == Duration::MAX {
            return self.inner.execute(context, input).await;
        }

        if context.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let outer = context.cancellation_token().clone();
        let derived = outer.child_token();
        let synchronous = context.is_synchronous();

        let completed = {
            let mut scope = CancellationScope::enter(context, derived.clone());

            if synchronous {
                let _watchdog = Watchdog::arm(&shared.clock, timeout, &derived);
                Some(self.inner.execute(&mut scope, input).await)
            } else {
                let operation = pin!(self.inner.execute(&mut scope, input));
                let deadline = pin!(shared.clock.delay(timeout));

                match select(operation, deadline).await {
                    Either::Left((out, _)) => Some(out),
                    Either::Right(((), _)) => {
                        derived.cancel();
                        None
                    }
                }
            }
        };

        match completed {
            Some(out) if !is_timeout_cancellation(&out, &derived, &outer) => out,
            _ if outer.is_cancelled() => Err(Error::Cancelled),
            _ => shared.timed_out(context, timeout),
        }
    }
}

/// A cancelled outcome caused by the derived token rather than by the caller.
fn is_timeout_cancellation<T, E>(out: &Outcome<T, E>, derived: &CancellationToken, outer: &CancellationToken) -> bool {
    matches!(out, Err(Error::Cancelled)) && derived.is_cancelled() && !outer.is_cancelled()
}

impl<In, T, E> TimeoutShared<In, Outcome<T, E>> {
    fn timeout_for(&self, input: &In) -> Duration {
        self.timeout_generator
            .as_ref()
            .and_then(|generator| {
                generator.call(
                    input,
                    TimeoutGeneratorArgs {
                        default_timeout: self.timeout,
                    },
                )
            })
            .unwrap_or(self.timeout)
    }

    fn timed_out(&self, context: &mut ResilienceContext, timeout: Duration) -> Outcome<T, E> {
        let out = Err(TimeoutRejected::new(timeout).into());
        let args = OnTimeoutArgs { timeout };

        self.emit_telemetry(timeout);
        self.telemetry.report(context, TIMEOUT_EVENT, Some(OutcomeKind::Timeout), &args);

        if let Some(on_timeout) = &self.on_timeout {
            on_timeout.call(&out, args);
        }

        out
    }

    #[cfg_attr(
        not(any(feature = "logs", feature = "metrics", test)),
        expect(unused_variables, clippy::unused_self, reason = "unused when logs and metrics are disabled")
    )]
    fn emit_telemetry(&self, timeout: Duration) {
        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.timeout",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                timeout.ms = timeout.as_millis(),
            );
        }

        #[cfg(any(feature = "metrics", test))]
        if self.telemetry.metrics_enabled() {
            self.telemetry.report_metrics(ON_TIMEOUT, &[]);
        }
    }
}
