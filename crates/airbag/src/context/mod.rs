// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-execution state shared by every strategy in a pipeline.

use std::borrow::Cow;

use tokio_util::sync::CancellationToken;

mod cancellation;
mod events;
mod pool;
mod properties;

#[cfg(any(feature = "timeout", test))]
pub(crate) use cancellation::CancellationScope;
pub use events::{ResilienceEvent, ResilienceEventSeverity};
pub use pool::{PooledContext, ResilienceContextPool};
pub use properties::{ResilienceProperties, ResiliencePropertyKey};

/// Carries cancellation, properties and reported events through one execution.
///
/// A context is exclusively owned by a single logical execution, including all retries
/// performed on its behalf. Strategies receive it as `&mut`, which rules out concurrent access
/// by construction.
///
/// Strategies may temporarily substitute the cancellation token (the timeout strategy installs
/// a derived token), but the original token is always restored before the strategy returns.
#[derive(Debug, Default)]
pub struct ResilienceContext {
    cancellation: CancellationToken,
    operation_key: Option<Cow<'static, str>>,
    properties: ResilienceProperties,
    synchronous: bool,
    events: Vec<ResilienceEvent>,
}

impl ResilienceContext {
    /// Creates a new context with a fresh, never cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new context observing the given cancellation token.
    #[must_use]
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancellation: token,
            ..Self::default()
        }
    }

    /// The token the current strategy and the operation must observe.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` if the current token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// An optional caller supplied name of the operation being executed.
    #[must_use]
    pub fn operation_key(&self) -> Option<&str> {
        self.operation_key.as_deref()
    }

    /// Sets the operation key.
    pub fn set_operation_key(&mut self, key: impl Into<Cow<'static, str>>) {
        self.operation_key = Some(key.into());
    }

    /// The property bag of this execution.
    #[must_use]
    pub fn properties(&self) -> &ResilienceProperties {
        &self.properties
    }

    /// The mutable property bag of this execution.
    #[must_use]
    pub fn properties_mut(&mut self) -> &mut ResilienceProperties {
        &mut self.properties
    }

    /// Returns `true` when the execution runs in blocking mode.
    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    /// The events reported by strategies so far, in the order they occurred.
    #[must_use]
    pub fn events(&self) -> &[ResilienceEvent] {
        &self.events
    }

    pub(crate) fn add_event(&mut self, event: ResilienceEvent) {
        self.events.push(event);
    }

    pub(crate) fn set_synchronous(&mut self, synchronous: bool) {
        self.synchronous = synchronous;
    }

    /// Installs `token` and returns the one it replaced.
    #[cfg(any(feature = "timeout", test))]
    pub(crate) fn replace_cancellation(&mut self, token: CancellationToken) -> CancellationToken {
        std::mem::replace(&mut self.cancellation, token)
    }

    pub(crate) fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancellation = token;
    }

    /// Clears all per-execution state while keeping allocations.
    pub(crate) fn reset(&mut self) {
        self.cancellation = CancellationToken::new();
        self.operation_key = None;
        self.properties.clear();
        self.synchronous = false;
        self.events.clear();
    }
}
