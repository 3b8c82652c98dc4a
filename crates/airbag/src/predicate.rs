// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Type-keyed outcome predicates shared by the retry and circuit breaker strategies.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::{BrokenCircuit, Error, ExecutionRejected, Outcome, RateLimiterRejected, TimeoutRejected};

type ErasedPredicate = Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Side {
    Result,
    Error,
}

/// Collects handlers that decide whether an outcome should be handled (retried, or counted as a
/// failure by a circuit breaker).
///
/// Each handler is registered for one concrete payload type and is type-checked at
/// registration. At evaluation time the outcome's payload is routed by its type to the handlers
/// registered for that type, so handlers for different types never see each other's values.
/// Within one type the handlers run in registration order and the first one that returns `true`
/// wins. When nothing matches the outcome is not handled.
///
/// Cancellation is never handled, whatever handlers are registered.
///
/// ```
/// use airbag::{Error, Outcome, PredicateBuilder, TimeoutRejected};
/// use std::time::Duration;
///
/// let predicate = PredicateBuilder::<u16, std::io::Error>::new()
///     .handle_result(|status| *status >= 500)
///     .handle_error(|error| error.kind() == std::io::ErrorKind::ConnectionReset)
///     .handle_timeout()
///     .build();
///
/// assert!(predicate.should_handle(&Ok(503)));
/// assert!(!predicate.should_handle(&Ok(200)));
/// assert!(predicate.should_handle(&Err(TimeoutRejected::new(Duration::from_secs(1)).into())));
/// assert!(!predicate.should_handle(&Err(Error::Cancelled)));
/// ```
pub struct PredicateBuilder<T, E> {
    handlers: HashMap<(Side, TypeId), Vec<ErasedPredicate>>,
    _types: PhantomData<fn(&T, &E)>,
}

impl<T: 'static, E: 'static> PredicateBuilder<T, E> {
    /// Creates an empty registry that handles nothing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            _types: PhantomData,
        }
    }

    /// Handles successful results for which `predicate` returns `true`.
    #[must_use]
    pub fn handle_result(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.register::<T>(Side::Result, predicate)
    }

    /// Handles operation errors for which `predicate` returns `true`.
    #[must_use]
    pub fn handle_error(self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.register::<E>(Side::Error, predicate)
    }

    /// Handles failures whose payload is of type `X` and for which `predicate` returns `true`.
    ///
    /// `X` is matched against the operation error type and the rejection types
    /// ([`TimeoutRejected`], [`BrokenCircuit`], [`RateLimiterRejected`]).
    #[must_use]
    pub fn handle<X: 'static>(self, predicate: impl Fn(&X) -> bool + Send + Sync + 'static) -> Self {
        self.register::<X>(Side::Error, predicate)
    }

    /// Handles every timeout rejected by an inner timeout strategy.
    #[must_use]
    pub fn handle_timeout(self) -> Self {
        self.handle::<TimeoutRejected>(|_| true)
    }

    /// Handles every rejection by an inner circuit breaker.
    #[must_use]
    pub fn handle_broken_circuit(self) -> Self {
        self.handle::<BrokenCircuit>(|_| true)
    }

    /// Handles every rate limiter rejection.
    #[must_use]
    pub fn handle_rate_limiter(self) -> Self {
        self.handle::<RateLimiterRejected>(|_| true)
    }

    /// Freezes the registry into a cheaply clonable predicate.
    #[must_use]
    pub fn build(self) -> OutcomePredicate<T, E> {
        OutcomePredicate {
            handlers: Arc::new(self.handlers),
            _types: PhantomData,
        }
    }

    fn register<X: 'static>(mut self, side: Side, predicate: impl Fn(&X) -> bool + Send + Sync + 'static) -> Self {
        let erased: ErasedPredicate = Arc::new(move |value: &dyn Any| value.downcast_ref::<X>().is_some_and(&predicate));
        self.handlers.entry((side, TypeId::of::<X>())).or_default().push(erased);
        self
    }
}

impl<T: 'static, E: 'static> Default for PredicateBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Debug for PredicateBuilder<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateBuilder")
            .field("handlers", &self.handlers.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

/// The frozen form of a [`PredicateBuilder`].
pub struct OutcomePredicate<T, E> {
    handlers: Arc<HashMap<(Side, TypeId), Vec<ErasedPredicate>>>,
    _types: PhantomData<fn(&T, &E)>,
}

impl<T: 'static, E: 'static> OutcomePredicate<T, E> {
    /// Evaluates the outcome against the handlers registered for its payload type.
    #[must_use]
    pub fn should_handle(&self, outcome: &Outcome<T, E>) -> bool {
        let (key, value): ((Side, TypeId), &dyn Any) = match outcome {
            Ok(value) => ((Side::Result, TypeId::of::<T>()), value as &dyn Any),
            Err(Error::Operation(error)) => ((Side::Error, TypeId::of::<E>()), error as &dyn Any),
            Err(Error::Rejected(ExecutionRejected::Timeout(rejected))) => ((Side::Error, TypeId::of::<TimeoutRejected>()), rejected as &dyn Any),
            Err(Error::Rejected(ExecutionRejected::BrokenCircuit(rejected))) => {
                ((Side::Error, TypeId::of::<BrokenCircuit>()), rejected as &dyn Any)
            }
            Err(Error::Rejected(ExecutionRejected::RateLimiter(rejected))) => {
                ((Side::Error, TypeId::of::<RateLimiterRejected>()), rejected as &dyn Any)
            }
            Err(Error::Cancelled) => return false,
        };

        self.handlers
            .get(&key)
            .is_some_and(|handlers| handlers.iter().any(|handler| handler(value)))
    }
}

impl<T, E> Clone for OutcomePredicate<T, E> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
            _types: PhantomData,
        }
    }
}

impl<T, E> Debug for OutcomePredicate<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomePredicate")
            .field("handlers", &self.handlers.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
