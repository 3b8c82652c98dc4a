// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use super::backoff::{BackoffSchedule, Delays};
use tick::{Clock, Stopwatch};

use super::{CloneArgs, CloneInput, DelayGenerator, DelayGeneratorArgs, OnRetry, OnRetryArgs, RetryLayer, ShouldRetry, ShouldRetryArgs};
use crate::delay::delay_or_cancel;
use crate::options::MaxAttempts;
use crate::telemetry::{ON_RETRY, TelemetryHelper};
use crate::{
    Attempt, EnableIf, Error, NotSet, Outcome, OutcomeKind, PipelineOptions, ResilienceContext, ResilienceEvent,
    ResilienceEventSeverity, Service,
};

const RETRY_EVENT: ResilienceEvent = ResilienceEvent::new(ON_RETRY, ResilienceEventSeverity::Warning);

/// Re-executes the inner service while its outcome is handled.
///
/// Each attempt runs with a fresh clone of the input. Between attempts the strategy waits for
/// a delay from the configured backoff (or from the delay generator), observing the context's
/// cancellation token: a cancelled execution never starts another attempt and never finishes a
/// delay, and always ends with [`Error::Cancelled`]. Cancelled outcomes are never retried.
///
/// When the attempt budget runs out while the outcome is still handled, the last outcome is
/// returned as is.
///
/// ```
/// use std::time::Duration;
///
/// use airbag::retry::Retry;
/// use airbag::{Error, Execute, Outcome, PipelineOptions, ResilienceContext, Stack};
/// use tick::Clock;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let options = PipelineOptions::<u32, Outcome<u32, String>>::new(Clock::new_tokio());
///
/// let pipeline = (
///     Retry::layer("retry", &options)
///         .clone_input()
///         .should_handle(|outcome, _args| outcome.is_err())
///         .max_retry_attempts(2)
///         .base_delay(Duration::from_millis(100)),
///     Execute::new(|_ctx: &mut ResilienceContext, id: u32| async move { Err::<u32, _>(Error::Operation(format!("{id} failed"))) }),
/// )
///     .into_pipeline();
///
/// let outcome = pipeline.execute(7).await;
/// assert_eq!(outcome, Err(Error::Operation("7 failed".to_string())));
/// # }
/// ```
#[derive(Debug)]
pub struct Retry<In, Out, S> {
    pub(super) shared: Arc<RetryShared<In, Out>>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct RetryShared<In, Out> {
    pub(crate) clock: Clock,
    pub(crate) max_attempts: MaxAttempts,
    pub(crate) backoff: BackoffSchedule,
    pub(crate) clone_input: CloneInput<In>,
    pub(crate) should_retry: ShouldRetry<Out>,
    pub(crate) delay_generator: Option<DelayGenerator<Out>>,
    pub(crate) on_retry: Option<OnRetry<Out>>,
    pub(crate) enable_if: EnableIf<In>,
    pub(crate) telemetry: TelemetryHelper,
}

impl<In, Out, S: Clone> Clone for Retry<In, Out, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl<In, Out> Retry<In, Out, ()> {
    /// Starts building a retry strategy named `name`.
    pub fn layer(name: impl Into<std::borrow::Cow<'static, str>>, options: &PipelineOptions<In, Out>) -> RetryLayer<In, Out, NotSet, NotSet> {
        RetryLayer::new(name.into(), options)
    }
}

impl<In, T, E, S> Service<In> for Retry<In, Outcome<T, E>, S>
where
    In: Send,
    T: Send,
    E: Send,
    S: Service<In, Out = Outcome<T, E>>,
{
    type Out = Outcome<T, E>;

    #[cfg_attr(test, mutants::skip)] // mutating the enable_if check loops forever
    async fn execute(&self, context: &mut ResilienceContext, mut input: In) -> Self::Out {
        if !self.shared.enable_if.call(&input) {
            return self.inner.execute(context, input).await;
        }

        let shared = &*self.shared;
        let stopwatch = shared.clock.stopwatch();
        let mut delays = shared.backoff.delays();
        let mut attempt = shared.max_attempts.first_attempt();

        loop {
            if context.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let (original_input, attempt_input) = shared.clone_input(input, attempt);
            let out = self.inner.execute(context, attempt_input).await;

            match shared.evaluate_attempt(context, original_input, out, attempt, &mut delays, &stopwatch) {
                ControlFlow::Continue(next) => {
                    if delay_or_cancel(&shared.clock, next.delay, context.cancellation_token()).await.is_err() {
                        return Err(Error::Cancelled);
                    }

                    input = next.input;
                    attempt = next.attempt;
                }
                ControlFlow::Break(out) => return out,
            }
        }
    }
}

impl<In, T, E> RetryShared<In, Outcome<T, E>> {
    /// Returns the input to keep for the next attempt (if the clone succeeded) and the input for
    /// this attempt.
    fn clone_input(&self, mut input: In, attempt: Attempt) -> (Option<In>, In) {
        match self.clone_input.call(&mut input, CloneArgs { attempt }) {
            Some(cloned) => (Some(input), cloned),
            None => (None, input),
        }
    }

    fn evaluate_attempt(
        &self,
        context: &mut ResilienceContext,
        original_input: Option<In>,
        out: Outcome<T, E>,
        attempt: Attempt,
        delays: &mut Delays<'_>,
        stopwatch: &Stopwatch,
    ) -> ControlFlow<Outcome<T, E>, NextAttempt<In>> {
        if matches!(out, Err(Error::Cancelled)) || !self.should_retry.call(&out, ShouldRetryArgs { attempt }) {
            return ControlFlow::Break(out);
        }

        let Some(next_attempt) = attempt.increment(self.max_attempts) else {
            self.emit_telemetry(attempt, Duration::ZERO, OutcomeKind::of(&out));
            return ControlFlow::Break(out);
        };

        let Some(input) = original_input else {
            return ControlFlow::Break(out);
        };

        let backoff_delay = delays.next().unwrap_or(Duration::ZERO);
        let retry_delay = self
            .delay_generator
            .as_ref()
            .and_then(|generator| generator.call(&out, DelayGeneratorArgs { attempt, backoff_delay }))
            .unwrap_or(backoff_delay);

        let args = OnRetryArgs {
            attempt,
            retry_delay,
            duration: stopwatch.elapsed(),
        };

        let outcome = OutcomeKind::of(&out);
        self.emit_telemetry(attempt, retry_delay, outcome);
        self.telemetry.report(context, RETRY_EVENT, Some(outcome), &args);

        if let Some(on_retry) = &self.on_retry {
            on_retry.call(&out, args);
        }

        ControlFlow::Continue(NextAttempt {
            input,
            attempt: next_attempt,
            delay: retry_delay,
        })
    }

    #[cfg_attr(
        not(any(feature = "logs", feature = "metrics", test)),
        expect(unused_variables, clippy::unused_self, reason = "unused when logs and metrics are disabled")
    )]
    fn emit_telemetry(&self, attempt: Attempt, retry_delay: Duration, outcome: OutcomeKind) {
        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "airbag.retry",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.attempt.index = attempt.index(),
                resilience.attempt.is_last = attempt.is_last(),
                resilience.retry.delay = retry_delay.as_secs_f32(),
                resilience.outcome.kind = outcome.as_str(),
            );
        }

        #[cfg(any(feature = "metrics", test))]
        if self.telemetry.metrics_enabled() {
            use opentelemetry::KeyValue;

            use crate::telemetry::{ATTEMPT_INDEX, ATTEMPT_IS_LAST, OUTCOME_KIND};

            self.telemetry.report_metrics(
                ON_RETRY,
                &[
                    KeyValue::new(ATTEMPT_INDEX, i64::from(attempt.index())),
                    KeyValue::new(ATTEMPT_IS_LAST, attempt.is_last()),
                    KeyValue::new(OUTCOME_KIND, outcome.as_str()),
                ],
            );
        }
    }
}

struct NextAttempt<In> {
    input: In,
    attempt: Attempt,
    delay: Duration,
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use futures::executor::block_on;
    use tick::ClockControl;
    use tokio_util::sync::CancellationToken;
    use tower_layer::Layer;

    use super::*;
    use crate::rnd::Rnd;
    use crate::telemetry::TelemetryEvent;
    use crate::testing::LogCapture;
    use crate::{Backoff, Execute, ExecuteBlocking, PredicateBuilder, TimeoutRejected};

    type TestOutcome = Outcome<String, String>;

    fn auto_advancing() -> ClockControl {
        ClockControl::default().auto_advance_timers(true)
    }

    fn options(control: &ClockControl) -> PipelineOptions<String, TestOutcome> {
        PipelineOptions::new(control.to_clock()).name("test_pipeline")
    }

    fn failing_leaf(calls: &Arc<AtomicU32>) -> impl Service<String, Out = TestOutcome> + use<> {
        let calls = Arc::clone(calls);
        Execute::new(move |_ctx: &mut ResilienceContext, input: String| {
            let n = calls.fetch_add(1, Ordering::Relaxed);
            async move { Err(Error::Operation(format!("{input}-{n}"))) }
        })
    }

    fn retry_all(options: &PipelineOptions<String, TestOutcome>) -> RetryLayer<String, TestOutcome> {
        Retry::layer("test_retry", options)
            .clone_input()
            .should_handle(|outcome, _| outcome.is_err())
            .use_jitter(false)
    }

    #[test]
    fn static_assertions() {
        type Leaf = Execute<fn(&mut ResilienceContext, String) -> std::future::Ready<TestOutcome>>;
        static_assertions::assert_impl_all!(Retry<String, TestOutcome, Leaf>: Send, Sync, Service<String>);
    }

    #[test]
    fn invokes_leaf_retries_plus_one_and_returns_last_outcome() {
        let control = auto_advancing();
        let calls = Arc::new(AtomicU32::new(0));
        let service = retry_all(&options(&control)).max_retry_attempts(2).layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let outcome = block_on(service.execute(&mut context, "req".to_string()));

        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(outcome, Err(Error::Operation("req-2".to_string())));
        assert_eq!(context.events(), &[RETRY_EVENT, RETRY_EVENT]);
    }

    #[test]
    fn zero_retries_runs_once() {
        let control = auto_advancing();
        let watch = control.to_clock().stopwatch();
        let calls = Arc::new(AtomicU32::new(0));
        let service = retry_all(&options(&control)).max_retry_attempts(0).layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let _ = block_on(service.execute(&mut context, "req".to_string()));

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(context.events().is_empty());
        assert_eq!(watch.elapsed(), Duration::ZERO);
    }

    #[test]
    fn exponential_delays_without_jitter() {
        let control = auto_advancing();
        let watch = control.to_clock().stopwatch();
        let delays = Arc::new(Mutex::new(Vec::new()));
        let delays_clone = Arc::clone(&delays);
        let calls = Arc::new(AtomicU32::new(0));

        let service = retry_all(&options(&control))
            .backoff(Backoff::Exponential)
            .base_delay(Duration::from_secs(1))
            .on_retry(move |_, args| delays_clone.lock().unwrap().push(args.retry_delay()))
            .layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let _ = block_on(service.execute(&mut context, "req".to_string()));

        assert_eq!(
            *delays.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert_eq!(watch.elapsed(), Duration::from_secs(7));
    }

    #[test]
    fn on_retry_reports_attempt_and_duration() {
        let control = auto_advancing();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let calls = Arc::new(AtomicU32::new(0));

        let service = retry_all(&options(&control))
            .backoff(Backoff::Constant)
            .base_delay(Duration::from_secs(2))
            .max_retry_attempts(2)
            .on_retry(move |_, args| seen_clone.lock().unwrap().push((args.attempt(), args.duration())))
            .layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let _ = block_on(service.execute(&mut context, "req".to_string()));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (Attempt::new(0, false), Duration::ZERO),
                (Attempt::new(1, false), Duration::from_secs(2)),
            ]
        );
    }

    #[test]
    fn success_is_not_retried() {
        let control = auto_advancing();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let service = retry_all(&options(&control)).layer(Execute::new(move |_ctx: &mut ResilienceContext, input: String| {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            async move { Ok(input) }
        }));

        let mut context = ResilienceContext::new();
        assert_eq!(block_on(service.execute(&mut context, "ok".to_string())), Ok("ok".to_string()));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn recovers_after_transient_failures() {
        let control = auto_advancing();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let service = retry_all(&options(&control)).layer(Execute::new(move |_ctx: &mut ResilienceContext, input: String| {
            let n = calls_clone.fetch_add(1, Ordering::Relaxed);
            async move { if n < 2 { Err(Error::Operation("transient".to_string())) } else { Ok(input) } }
        }));

        let mut context = ResilienceContext::new();
        assert_eq!(block_on(service.execute(&mut context, "value".to_string())), Ok("value".to_string()));
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn cancelled_outcome_is_never_retried() {
        let control = auto_advancing();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let service = Retry::layer("test_retry", &options(&control))
            .clone_input()
            .should_handle(|_, _| true)
            .layer(Execute::new(move |_ctx: &mut ResilienceContext, _input: String| {
                calls_clone.fetch_add(1, Ordering::Relaxed);
                async { Err(Error::Cancelled) }
            }));

        let mut context = ResilienceContext::new();
        assert_eq!(block_on(service.execute(&mut context, "x".to_string())), Err(Error::Cancelled));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn cancelled_before_start_skips_inner() {
        let control = auto_advancing();
        let calls = Arc::new(AtomicU32::new(0));
        let service = retry_all(&options(&control)).layer(failing_leaf(&calls));

        let token = CancellationToken::new();
        token.cancel();
        let mut context = ResilienceContext::with_cancellation(token);

        assert_eq!(block_on(service.execute(&mut context, "x".to_string())), Err(Error::Cancelled));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn cancellation_during_attempt_stops_loop() {
        let control = auto_advancing();
        let watch = control.to_clock().stopwatch();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let service = retry_all(&options(&control)).layer(Execute::new(move |ctx: &mut ResilienceContext, _input: String| {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            // The operation observes the caller giving up but still reports its own failure.
            ctx.cancellation_token().cancel();
            async { Err(Error::Operation("failed".to_string())) }
        }));

        let mut context = ResilienceContext::new();
        assert_eq!(block_on(service.execute(&mut context, "x".to_string())), Err(Error::Cancelled));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(watch.elapsed(), Duration::ZERO);
    }

    #[test]
    fn clone_returning_none_stops_retrying() {
        let control = auto_advancing();
        let calls = Arc::new(AtomicU32::new(0));

        let service = Retry::layer("test_retry", &options(&control))
            .clone_input_with(|input, args| (args.attempt().index() < 1).then(|| input.clone()))
            .should_handle(|outcome, _| outcome.is_err())
            .layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let outcome = block_on(service.execute(&mut context, "req".to_string()));

        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(outcome, Err(Error::Operation("req-1".to_string())));
    }

    #[test]
    fn delay_generator_overrides_backoff() {
        let control = auto_advancing();
        let watch = control.to_clock().stopwatch();
        let calls = Arc::new(AtomicU32::new(0));

        let service = retry_all(&options(&control))
            .max_retry_attempts(2)
            .base_delay(Duration::from_secs(1))
            .delay_generator(|_, args| (args.attempt().is_first()).then_some(Duration::from_millis(10)))
            .layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let _ = block_on(service.execute(&mut context, "req".to_string()));

        // 10ms from the generator, then the second backoff delay (2s).
        assert_eq!(watch.elapsed(), Duration::from_millis(2010));
    }

    #[test]
    fn predicate_registry_selects_outcomes() {
        let control = auto_advancing();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let service = Retry::layer("test_retry", &options(&control))
            .clone_input()
            .handle(PredicateBuilder::new().handle_timeout())
            .layer(Execute::new(move |_ctx: &mut ResilienceContext, _input: String| {
                let n = calls_clone.fetch_add(1, Ordering::Relaxed);
                async move {
                    if n == 0 {
                        Err(TimeoutRejected::new(Duration::from_millis(50)).into())
                    } else {
                        Err(Error::Operation("not retried".to_string()))
                    }
                }
            }));

        let mut context = ResilienceContext::new();
        let outcome = block_on(service.execute(&mut context, "x".to_string()));

        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(outcome, Err(Error::Operation("not retried".to_string())));
    }

    #[test]
    fn disabled_passes_through() {
        let control = auto_advancing();
        let calls = Arc::new(AtomicU32::new(0));
        let service = retry_all(&options(&control)).disable().layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let _ = block_on(service.execute(&mut context, "x".to_string()));

        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn synchronous_mode_blocks_on_controlled_clock() {
        let control = auto_advancing();
        let watch = control.to_clock().stopwatch();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let service = retry_all(&options(&control))
            .backoff(Backoff::Constant)
            .base_delay(Duration::from_millis(100))
            .layer(ExecuteBlocking::new(move |_ctx: &mut ResilienceContext, _input: String| {
                calls_clone.fetch_add(1, Ordering::Relaxed);
                Err(Error::Operation("sync".to_string()))
            }));

        let mut context = ResilienceContext::new();
        context.set_synchronous(true);
        let _ = block_on(service.execute(&mut context, "x".to_string()));

        assert_eq!(calls.load(Ordering::Relaxed), 4);
        assert_eq!(watch.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn jitter_uses_rnd() {
        let control = auto_advancing();
        let watch = control.to_clock().stopwatch();
        let calls = Arc::new(AtomicU32::new(0));

        let service = retry_all(&options(&control))
            .backoff(Backoff::Constant)
            .base_delay(Duration::from_secs(1))
            .use_jitter(true)
            .max_retry_attempts(1)
            .set_rnd(Rnd::new_fixed(0.0))
            .layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let _ = block_on(service.execute(&mut context, "x".to_string()));

        assert_eq!(watch.elapsed(), Duration::from_millis(750));
    }

    #[test]
    fn listener_receives_retry_arguments() {
        let control = auto_advancing();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let options = options(&control).telemetry_listener(move |event: &TelemetryEvent<'_>| {
            let args = event.arguments_as::<OnRetryArgs>().map(OnRetryArgs::retry_delay);
            seen_clone
                .lock()
                .unwrap()
                .push((event.event(), event.strategy_name().to_string(), event.outcome(), args));
        });
        let calls = Arc::new(AtomicU32::new(0));

        let service = retry_all(&options)
            .backoff(Backoff::Constant)
            .base_delay(Duration::from_millis(5))
            .max_retry_attempts(1)
            .layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let _ = block_on(service.execute(&mut context, "x".to_string()));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(
                RETRY_EVENT,
                "test_retry".to_string(),
                Some(OutcomeKind::OperationError),
                Some(Duration::from_millis(5))
            )]
        );
    }

    #[test]
    fn retry_emits_log() {
        let capture = LogCapture::new();
        let _guard = capture.set_default();

        let control = auto_advancing();
        let calls = Arc::new(AtomicU32::new(0));
        let service = retry_all(&options(&control).enable_logs())
            .max_retry_attempts(1)
            .layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let _ = block_on(service.execute(&mut context, "x".to_string()));

        capture.assert_contains("airbag::retry");
        capture.assert_contains("test_pipeline");
        capture.assert_contains("test_retry");
        capture.assert_contains("resilience.attempt.index=0");
        capture.assert_contains("resilience.attempt.is_last=true");
        capture.assert_contains("operation_error");
    }

    #[cfg(not(miri))]
    #[test]
    fn retries_exhausted_reports_metrics() {
        use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};

        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build();

        let control = auto_advancing();
        let calls = Arc::new(AtomicU32::new(0));
        let service = retry_all(&options(&control).enable_metrics(&provider))
            .max_retry_attempts(2)
            .layer(failing_leaf(&calls));

        let mut context = ResilienceContext::new();
        let _ = block_on(service.execute(&mut context, "x".to_string()));

        provider.force_flush().unwrap();
        let dump = format!("{:?}", exporter.get_finished_metrics().unwrap());

        assert!(dump.contains("resilience.event"));
        assert!(dump.contains("OnRetry"));
        assert!(dump.contains("resilience.attempt.index"));
        assert!(dump.contains("resilience.attempt.is_last"));
        assert!(dump.contains("test_pipeline"));
        assert!(dump.contains("test_retry"));
    }
}
