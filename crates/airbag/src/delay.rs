// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::pin;
use std::time::Duration;

use futures_util::future::{Either, select};
use tick::Clock;
use tokio_util::sync::CancellationToken;

/// The wait was interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DelayCancelled;

/// Waits on `clock` for `duration` unless `token` fires first.
///
/// Synchronous executions drive this future with a blocking executor, so the calling thread
/// parks until the clock's timer fires or the token is cancelled.
pub(crate) async fn delay_or_cancel(clock: &Clock, duration: Duration, token: &CancellationToken) -> Result<(), DelayCancelled> {
    if token.is_cancelled() {
        return Err(DelayCancelled);
    }

    if duration.is_zero() {
        return Ok(());
    }

    let delay = clock.delay(duration);
    let cancelled = pin!(token.cancelled());

    match select(delay, cancelled).await {
        Either::Left(((), _)) => Ok(()),
        Either::Right(((), _)) => Err(DelayCancelled),
    }
}
