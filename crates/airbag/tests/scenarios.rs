// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(all(feature = "retry", feature = "timeout", feature = "circuit-breaker"))]

//! End-to-end scenarios combining several strategies in one pipeline.

use std::sync::atomic::{AtomicU32, Ordering};
use std::pin::pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use airbag::circuit_breaker::{CircuitBreaker, CircuitBreakerStateProvider, CircuitState};
use airbag::retry::Retry;
use airbag::telemetry::{ON_CIRCUIT_OPENED, ON_RETRY, ON_TIMEOUT, TelemetryEvent};
use airbag::timeout::Timeout;
use airbag::{Backoff, Error, Execute, Outcome, PipelineOptions, PredicateBuilder, ResilienceContext, Stack, TimeoutRejected};
use tick::{Clock, ClockControl};

type TestOutcome = Outcome<String, String>;

fn options(clock: &Clock) -> PipelineOptions<String, TestOutcome> {
    PipelineOptions::new(clock).name("scenario")
}

/// Polls `future` to completion, moving the clock forward by one millisecond whenever it is pending.
fn run_stepping<F: Future>(control: &ClockControl, future: F) -> F::Output {
    let mut future = pin!(future);
    let mut cx = Context::from_waker(Waker::noop());

    for _ in 0..1_000_000 {
        if let Poll::Ready(out) = future.as_mut().poll(&mut cx) {
            return out;
        }

        control.advance(Duration::from_millis(1));
    }

    panic!("future did not complete after advancing the clock a million times");
}

#[test]
fn retry_around_timeout_bounds_each_attempt() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let leaf_clock = clock.clone();
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);

    let pipeline = (
        Retry::layer("retry", &options(&clock))
            .clone_input()
            .handle(PredicateBuilder::new().handle_timeout())
            .max_retry_attempts(2)
            .backoff(Backoff::Constant)
            .base_delay(Duration::from_millis(10))
            .use_jitter(false),
        Timeout::layer("timeout", &options(&clock)).timeout(Duration::from_millis(50)),
        Execute::new(move |_ctx: &mut ResilienceContext, input: String| {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            let delay = leaf_clock.delay(Duration::from_millis(200));
            async move {
                delay.await;
                Ok::<_, Error<String>>(input)
            }
        }),
    )
        .into_pipeline();

    let watch = clock.stopwatch();
    let mut context = ResilienceContext::new();
    let outcome = run_stepping(&control, pipeline.execute_with(&mut context, "req".to_string()));

    assert_eq!(outcome, Err(TimeoutRejected::new(Duration::from_millis(50)).into()));
    assert_eq!(calls.load(Ordering::Relaxed), 3);
    assert_eq!(watch.elapsed(), Duration::from_millis(170));

    let names: Vec<_> = context.events().iter().map(|e| e.name()).collect();
    assert_eq!(names, vec![ON_TIMEOUT, ON_RETRY, ON_TIMEOUT, ON_RETRY, ON_TIMEOUT]);
}

#[test]
fn retry_recovers_when_a_later_attempt_is_fast() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let leaf_clock = clock.clone();
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);

    let pipeline = (
        Retry::layer("retry", &options(&clock))
            .clone_input()
            .handle(PredicateBuilder::new().handle_timeout())
            .base_delay(Duration::from_millis(10)),
        Timeout::layer("timeout", &options(&clock)).timeout(Duration::from_millis(50)),
        Execute::new(move |_ctx: &mut ResilienceContext, input: String| {
            let n = calls_clone.fetch_add(1, Ordering::Relaxed);
            let latency = if n == 0 { 200 } else { 5 };
            let delay = leaf_clock.delay(Duration::from_millis(latency));
            async move {
                delay.await;
                Ok::<_, Error<String>>(input)
            }
        }),
    )
        .into_pipeline();

    assert_eq!(run_stepping(&control, pipeline.execute("req".to_string())), Ok("req".to_string()));
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn retry_stops_on_broken_circuit() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    let options = options(&clock).telemetry_listener(move |event: &TelemetryEvent<'_>| {
        events_clone
            .lock()
            .unwrap()
            .push(format!("{}:{}", event.strategy_name(), event.event().name()));
    });

    let provider = CircuitBreakerStateProvider::new();
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);

    let pipeline = (
        // broken circuits are not handled, so the retry gives up as soon as the circuit opens
        Retry::layer("retry", &options)
            .clone_input()
            .handle(PredicateBuilder::new().handle_error(|_: &String| true))
            .max_retry_attempts(10)
            .base_delay(Duration::from_millis(100)),
        CircuitBreaker::layer("breaker", &options)
            .handle(PredicateBuilder::new().handle_error(|_: &String| true))
            .min_throughput(3)
            .failure_threshold(0.5)
            .state_provider(&provider),
        Execute::new(move |_ctx: &mut ResilienceContext, _input: String| {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            async { Err::<String, _>(Error::Operation("unavailable".to_string())) }
        }),
    )
        .into_pipeline();

    let outcome = pipeline.execute("req".to_string()).await;

    assert!(outcome.unwrap_err().as_broken_circuit().is_some());
    assert_eq!(calls.load(Ordering::Relaxed), 3);
    assert_eq!(provider.circuit_state(), Some(CircuitState::Open));
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            format!("retry:{ON_RETRY}"),
            format!("retry:{ON_RETRY}"),
            format!("breaker:{ON_CIRCUIT_OPENED}"),
            format!("retry:{ON_RETRY}"),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn blocking_pipeline_times_out_and_retries() {
    let clock = Clock::new_tokio();
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);

    let pipeline = (
        Retry::layer("retry", &options(&clock))
            .clone_input()
            .handle(PredicateBuilder::new().handle_timeout())
            .max_retry_attempts(1)
            .backoff(Backoff::Constant)
            .base_delay(Duration::from_millis(5))
            .use_jitter(false),
        Timeout::layer("timeout", &options(&clock)).timeout(Duration::from_millis(20)),
        airbag::ExecuteBlocking::new(move |ctx: &mut ResilienceContext, input: String| -> TestOutcome {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            let start = std::time::Instant::now();
            while start.elapsed() < Duration::from_secs(5) {
                if ctx.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(input)
        }),
    )
        .into_pipeline();

    let start = std::time::Instant::now();
    let outcome = tokio::task::spawn_blocking(move || pipeline.execute_blocking("req".to_string()))
        .await
        .unwrap();

    assert!(outcome.unwrap_err().as_timeout().is_some());
    assert_eq!(calls.load(Ordering::Relaxed), 2);
    assert!(start.elapsed() < Duration::from_secs(5));
}
