// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::time::Duration;

use tick::{Clock, Delay};
use tokio_util::sync::CancellationToken;

/// Cancels a token when a blocking execution outlives its deadline.
///
/// A blocking operation holds the calling thread, so nothing polls a timer while it runs.
/// The watchdog registers a timer on the clock instead, with a waker that cancels the token.
/// The clock's shared driver fires it. Dropping the watchdog unregisters the timer.
#[derive(Debug)]
pub(super) struct Watchdog {
    _delay: Delay,
}

impl Watchdog {
    pub fn arm(clock: &Clock, timeout: Duration, token: &CancellationToken) -> Self {
        let waker = Waker::from(Arc::new(CancelOnWake(token.clone())));
        let mut delay = clock.delay(timeout);

        // The first poll registers the timer; only a zero timeout is ready right away.
        if Pin::new(&mut delay).poll(&mut Context::from_waker(&waker)).is_ready() {
            token.cancel();
        }

        Self { _delay: delay }
    }
}

struct CancelOnWake(CancellationToken);

impl Wake for CancelOnWake {
    fn wake(self: Arc<Self>) {
        self.0.cancel();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.cancel();
    }
}
