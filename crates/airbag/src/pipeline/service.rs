// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use crate::ResilienceContext;

/// The contract every strategy and every leaf operation implements.
///
/// A service receives the execution context and the input state and produces an output. A
/// strategy wraps an inner service and decides whether to invoke it zero times (an open circuit),
/// once (a timeout) or several times (a retry). Whatever happens, it must return a well formed
/// output and leave the context's cancellation token as it found it.
///
/// The context is passed as `&mut`, so only one strategy observes it at any moment.
///
/// ```
/// use airbag::{ResilienceContext, Service};
///
/// struct Echo;
///
/// impl Service<String> for Echo {
///     type Out = String;
///
///     async fn execute(&self, _context: &mut ResilienceContext, input: String) -> Self::Out {
///         input
///     }
/// }
/// ```
pub trait Service<In>: Send + Sync {
    /// The output type.
    type Out;

    /// Executes the service.
    fn execute(&self, context: &mut ResilienceContext, input: In) -> impl Future<Output = Self::Out> + Send;
}

impl<S, In> Service<In> for Box<S>
where
    S: Service<In>,
{
    type Out = S::Out;

    fn execute(&self, context: &mut ResilienceContext, input: In) -> impl Future<Output = Self::Out> + Send {
        (**self).execute(context, input)
    }
}

impl<S, In> Service<In> for Arc<S>
where
    S: Service<In>,
{
    type Out = S::Out;

    fn execute(&self, context: &mut ResilienceContext, input: In) -> impl Future<Output = Self::Out> + Send {
        (**self).execute(context, input)
    }
}
