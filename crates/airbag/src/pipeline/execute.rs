// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use super::Service;
use crate::ResilienceContext;

/// Turns an asynchronous closure into the leaf [`Service`] of a pipeline.
///
/// The closure receives the context synchronously, so it can read the cancellation token or
/// properties before producing the future. The returned future must not borrow the context.
///
/// ```
/// use airbag::{Error, Execute, Outcome, ResilienceContext, Service};
///
/// let leaf = Execute::new(|context: &mut ResilienceContext, id: u32| {
///     let token = context.cancellation_token().clone();
///     async move {
///         if token.is_cancelled() {
///             return Err(Error::Cancelled);
///         }
///         Ok::<_, Error<String>>(id * 2)
///     }
/// });
///
/// let mut context = ResilienceContext::new();
/// let outcome: Outcome<u32, String> = futures::executor::block_on(leaf.execute(&mut context, 21));
/// assert_eq!(outcome, Ok(42));
/// ```
#[derive(Clone)]
pub struct Execute<F>(F);

impl<F> Execute<F> {
    /// Creates a leaf from an asynchronous closure.
    pub fn new<In, Out, Fut>(f: F) -> Self
    where
        F: Fn(&mut ResilienceContext, In) -> Fut + Send + Sync,
        Fut: Future<Output = Out> + Send,
    {
        Self(f)
    }
}

impl<F> Debug for Execute<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execute").finish_non_exhaustive()
    }
}

impl<F, In, Out, Fut> Service<In> for Execute<F>
where
    F: Fn(&mut ResilienceContext, In) -> Fut + Send + Sync,
    Fut: Future<Output = Out> + Send,
{
    type Out = Out;

    fn execute(&self, context: &mut ResilienceContext, input: In) -> impl Future<Output = Self::Out> + Send {
        (self.0)(context, input)
    }
}

/// Turns a blocking closure into the leaf [`Service`] of a pipeline.
///
/// Intended for pipelines driven through
/// [`Pipeline::execute_blocking`][crate::Pipeline::execute_blocking]. The closure runs to
/// completion on the calling thread when the service is first polled and has full access to
/// the context.
#[derive(Clone)]
pub struct ExecuteBlocking<F>(F);

impl<F> ExecuteBlocking<F> {
    /// Creates a leaf from a blocking closure.
    pub fn new<In, Out>(f: F) -> Self
    where
        F: Fn(&mut ResilienceContext, In) -> Out + Send + Sync,
    {
        Self(f)
    }
}

impl<F> Debug for ExecuteBlocking<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteBlocking").finish_non_exhaustive()
    }
}

impl<F, In, Out> Service<In> for ExecuteBlocking<F>
where
    F: Fn(&mut ResilienceContext, In) -> Out + Send + Sync,
    In: Send,
    Out: Send,
{
    type Out = Out;

    async fn execute(&self, context: &mut ResilienceContext, input: In) -> Self::Out {
        (self.0)(context, input)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::ResiliencePropertyKey;

    const SEEN: ResiliencePropertyKey<bool> = ResiliencePropertyKey::new("seen");

    #[test]
    fn execute_ok() {
        let leaf = Execute::new(|_ctx: &mut ResilienceContext, v: String| async move { v.to_uppercase() });
        let mut context = ResilienceContext::new();

        assert_eq!(block_on(leaf.execute(&mut context, "a".to_string())), "A");
    }

    #[test]
    fn blocking_sees_context() {
        let leaf = ExecuteBlocking::new(|ctx: &mut ResilienceContext, v: u32| {
            ctx.properties_mut().set(&SEEN, true);
            v + 1
        });
        let mut context = ResilienceContext::new();

        assert_eq!(block_on(leaf.execute(&mut context, 1)), 2);
        assert_eq!(context.properties().get(&SEEN), Some(&true));
    }

    #[test]
    fn debug_ok() {
        let leaf = Execute::new(|_ctx: &mut ResilienceContext, v: u32| async move { v });
        assert_eq!(format!("{leaf:?}"), "Execute { .. }");

        let leaf = ExecuteBlocking::new(|_ctx: &mut ResilienceContext, v: u32| v);
        assert_eq!(format!("{leaf:?}"), "ExecuteBlocking { .. }");
    }
}
