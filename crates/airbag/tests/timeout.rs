// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(feature = "timeout")]

//! Integration tests for the timeout strategy using only public API.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use airbag::telemetry::{ON_TIMEOUT, TelemetryEvent};
use airbag::timeout::{OnTimeoutArgs, Timeout};
use airbag::{Error, Execute, ExecuteBlocking, Outcome, PipelineOptions, ResilienceContext, Service, Stack, TimeoutRejected};
use futures::executor::block_on;
use futures::future::{Either, select};
use tick::{Clock, ClockControl};
use tokio_util::sync::CancellationToken;

type TestOutcome = Outcome<&'static str, String>;

const STEP: Duration = Duration::from_millis(1);

fn options(clock: &Clock) -> PipelineOptions<Duration, TestOutcome> {
    PipelineOptions::new(clock).name("test_pipeline")
}

/// Waits on the clock for the input duration unless the context token fires first.
fn sleeper(clock: &Clock) -> impl Service<Duration, Out = TestOutcome> + use<> {
    let clock = clock.clone();
    Execute::new(move |ctx: &mut ResilienceContext, duration: Duration| {
        let token = ctx.cancellation_token().clone();
        let delay = clock.delay(duration);
        async move {
            match select(delay, pin!(token.cancelled())).await {
                Either::Left(_) => Ok("done"),
                Either::Right(_) => Err(Error::Cancelled),
            }
        }
    })
}

/// Polls `future` to completion, moving the clock forward by [`STEP`] whenever it is pending.
fn run_stepping<F: Future>(control: &ClockControl, future: F) -> F::Output {
    let mut future = pin!(future);
    let mut cx = Context::from_waker(Waker::noop());

    for _ in 0..1_000_000 {
        if let Poll::Ready(out) = future.as_mut().poll(&mut cx) {
            return out;
        }

        control.advance(STEP);
    }

    panic!("future did not complete after advancing the clock a million times");
}

#[test]
fn completes_within_timeout() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let pipeline = (Timeout::layer("timeout", &options(&clock)).timeout(Duration::from_millis(100)), sleeper(&clock)).into_pipeline();

    let watch = clock.stopwatch();
    let mut context = ResilienceContext::new();
    assert_eq!(run_stepping(&control, pipeline.execute_with(&mut context, Duration::from_millis(50))), Ok("done"));
    assert_eq!(watch.elapsed(), Duration::from_millis(50));
    assert!(context.events().is_empty());
}

#[test]
fn slow_operation_times_out() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let timeouts = Arc::new(Mutex::new(Vec::new()));
    let timeouts_clone = Arc::clone(&timeouts);

    let pipeline = (
        Timeout::layer("timeout", &options(&clock))
            .timeout(Duration::from_millis(100))
            .on_timeout(move |_, args: OnTimeoutArgs| timeouts_clone.lock().unwrap().push(args.timeout())),
        sleeper(&clock),
    )
        .into_pipeline();

    let watch = clock.stopwatch();
    let mut context = ResilienceContext::new();
    let outcome = run_stepping(&control, pipeline.execute_with(&mut context, Duration::from_secs(10)));

    assert_eq!(outcome, Err(TimeoutRejected::new(Duration::from_millis(100)).into()));
    assert_eq!(watch.elapsed(), Duration::from_millis(100));
    assert_eq!(*timeouts.lock().unwrap(), vec![Duration::from_millis(100)]);
    assert_eq!(context.events().len(), 1);
    assert_eq!(context.events()[0].name(), ON_TIMEOUT);
}

#[tokio::test]
async fn yielding_operation_completes_on_controlled_clock() {
    let clock = ClockControl::new().to_clock();
    let pipeline = (
        Timeout::layer("timeout", &options(&clock)).timeout(Duration::from_secs(1)),
        Execute::new(|_ctx: &mut ResilienceContext, _: Duration| async {
            tokio::task::yield_now().await;
            Ok::<_, Error<String>>("done")
        }),
    )
        .into_pipeline();

    assert_eq!(pipeline.execute(Duration::ZERO).await, Ok("done"));
}

#[tokio::test]
async fn caller_cancellation_is_not_a_timeout() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let pipeline = (Timeout::layer("timeout", &options(&clock)).timeout(Duration::from_secs(1)), sleeper(&clock)).into_pipeline();

    let token = CancellationToken::new();
    let mut execution = pin!(pipeline.execute_with_cancellation(Duration::from_secs(10), token.clone()));
    assert!(futures::poll!(execution.as_mut()).is_pending());

    control.advance(Duration::from_millis(10));
    assert!(futures::poll!(execution.as_mut()).is_pending());

    token.cancel();
    assert_eq!(execution.await, Err(Error::Cancelled));
}

#[test]
fn already_cancelled_does_not_call_operation() {
    let called = Arc::new(AtomicBool::new(false));
    let called_clone = Arc::clone(&called);

    let pipeline = (
        Timeout::layer("timeout", &options(&Clock::new_frozen())).timeout(Duration::from_secs(1)),
        Execute::new(move |_ctx: &mut ResilienceContext, _: Duration| {
            called_clone.store(true, Ordering::Relaxed);
            async { Ok::<_, Error<String>>("done") }
        }),
    )
        .into_pipeline();

    let token = CancellationToken::new();
    token.cancel();

    assert_eq!(block_on(pipeline.execute_with_cancellation(Duration::ZERO, token)), Err(Error::Cancelled));
    assert!(!called.load(Ordering::Relaxed));
}

#[test]
fn caller_token_is_restored_after_timeout() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let pipeline = (Timeout::layer("timeout", &options(&clock)).timeout(Duration::from_millis(10)), sleeper(&clock)).into_pipeline();

    let token = CancellationToken::new();
    let mut context = ResilienceContext::with_cancellation(token.clone());

    let outcome = run_stepping(&control, pipeline.execute_with(&mut context, Duration::from_secs(1)));
    assert!(outcome.unwrap_err().as_timeout().is_some());

    // the derived token fired, the caller's token did not
    assert!(!context.is_cancelled());

    token.cancel();
    assert!(context.is_cancelled());
}

#[test]
fn timeout_generator_overrides_default() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let pipeline = (
        Timeout::layer("timeout", &options(&clock))
            .timeout(Duration::from_millis(10))
            .timeout_generator(|input: &Duration, args| (*input > Duration::from_secs(1)).then(|| args.default_timeout() * 1000)),
        sleeper(&clock),
    )
        .into_pipeline();

    assert!(run_stepping(&control, pipeline.execute(Duration::from_millis(500))).is_err());
    assert_eq!(run_stepping(&control, pipeline.execute(Duration::from_secs(2))), Ok("done"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn blocking_operation_observes_derived_token() {
    let pipeline = (
        Timeout::layer("timeout", &options(&Clock::new_tokio())).timeout(Duration::from_millis(30)),
        ExecuteBlocking::new(|ctx: &mut ResilienceContext, max: Duration| -> TestOutcome {
            let start = std::time::Instant::now();
            while start.elapsed() < max {
                if ctx.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                std::thread::sleep(Duration::from_millis(2));
            }
            Ok("done")
        }),
    )
        .into_pipeline();

    let (timed_out, finished) = tokio::task::spawn_blocking(move || {
        (
            pipeline.execute_blocking(Duration::from_secs(10)),
            pipeline.execute_blocking(Duration::ZERO),
        )
    })
    .await
    .unwrap();

    assert_eq!(
        timed_out.unwrap_err().as_timeout().map(TimeoutRejected::timeout),
        Some(Duration::from_millis(30))
    );
    assert_eq!(finished, Ok("done"));
}

#[test]
fn listener_receives_timeout_event() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);

    let options = options(&clock).telemetry_listener(move |event: &TelemetryEvent<'_>| {
        events_clone.lock().unwrap().push((
            event.pipeline_name().to_string(),
            event.strategy_name().to_string(),
            event.event().to_string(),
            event.arguments_as::<OnTimeoutArgs>().map(OnTimeoutArgs::timeout),
        ));
    });

    let pipeline = (Timeout::layer("my_timeout", &options).timeout(Duration::from_millis(5)), sleeper(&clock)).into_pipeline();
    let _ = run_stepping(&control, pipeline.execute(Duration::from_secs(1)));

    assert_eq!(
        *events.lock().unwrap(),
        vec![(
            "test_pipeline".to_string(),
            "my_timeout".to_string(),
            "OnTimeout (error)".to_string(),
            Some(Duration::from_millis(5)),
        )]
    );
}
