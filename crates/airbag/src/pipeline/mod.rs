// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The strategy contract and pipeline composition.

mod builder;
mod execute;
mod service;
mod stack;

pub use builder::PipelineBuilder;
pub use execute::{Execute, ExecuteBlocking};
pub use service::Service;
pub use stack::Stack;

use std::fmt::Debug;

use tokio_util::sync::CancellationToken;

use crate::{ResilienceContext, ResilienceContextPool};

/// A composed chain of strategies ready to be executed.
///
/// A pipeline is built once and executed any number of times, concurrently. It holds no
/// per-call mutable state: each execution obtains its own [`ResilienceContext`] from an
/// internal pool, and the context is reset and returned to the pool however the execution ends.
///
/// Build a pipeline from a tuple with [`Stack::into_pipeline`][crate::Stack::into_pipeline] or
/// with a [`PipelineBuilder`][crate::PipelineBuilder].
pub struct Pipeline<S> {
    service: S,
    pool: ResilienceContextPool,
}

impl<S> Pipeline<S> {
    /// Wraps an already composed service.
    pub fn new(service: S) -> Self {
        Self::with_pool(service, ResilienceContextPool::default())
    }

    /// Wraps an already composed service, pooling contexts in `pool`.
    pub fn with_pool(service: S, pool: ResilienceContextPool) -> Self {
        Self { service, pool }
    }

    /// The composed service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// The pool contexts are drawn from.
    pub fn pool(&self) -> &ResilienceContextPool {
        &self.pool
    }

    /// Executes the pipeline asynchronously with a pooled context.
    pub async fn execute<In>(&self, input: In) -> S::Out
    where
        S: Service<In>,
    {
        let mut context = self.pool.get();
        self.service.execute(&mut context, input).await
    }

    /// Executes the pipeline asynchronously with a pooled context that observes `token`.
    pub async fn execute_with_cancellation<In>(&self, input: In, token: CancellationToken) -> S::Out
    where
        S: Service<In>,
    {
        let mut context = self.pool.get_with(token);
        self.service.execute(&mut context, input).await
    }

    /// Executes the pipeline asynchronously with a caller-owned context.
    ///
    /// The context keeps the events reported during the execution, which makes this the
    /// variant to use when the caller wants to inspect them.
    pub fn execute_with<'a, In>(&'a self, context: &'a mut ResilienceContext, input: In) -> impl Future<Output = S::Out> + Send + 'a
    where
        S: Service<In>,
        In: 'a,
    {
        self.service.execute(context, input)
    }

    /// Executes the pipeline on the calling thread.
    ///
    /// Strategies run in synchronous mode: backoff delays block the thread and timeouts are
    /// enforced by cancelling the token the operation observes.
    pub fn execute_blocking<In>(&self, input: In) -> S::Out
    where
        S: Service<In>,
    {
        let mut context = self.pool.get();
        context.set_synchronous(true);
        futures::executor::block_on(self.service.execute(&mut context, input))
    }

    /// Executes the pipeline on the calling thread with a caller-owned context.
    pub fn execute_blocking_with<In>(&self, context: &mut ResilienceContext, input: In) -> S::Out
    where
        S: Service<In>,
    {
        let previous = context.is_synchronous();
        context.set_synchronous(true);
        let out = futures::executor::block_on(self.service.execute(context, input));
        context.set_synchronous(previous);
        out
    }
}

impl<S> Debug for Pipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("pool", &self.pool).finish_non_exhaustive()
    }
}
