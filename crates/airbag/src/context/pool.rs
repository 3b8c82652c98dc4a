// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use super::ResilienceContext;
use crate::constants::ERR_POISONED_LOCK;

const DEFAULT_MAX_RETAINED: usize = 64;

/// A pool of reusable [`ResilienceContext`] instances.
///
/// Contexts are handed out as [`PooledContext`] guards. Dropping a guard resets the context
/// (fresh cancellation token, empty properties and events) and returns it to the pool, so a
/// context never carries state from one execution into the next.
#[derive(Debug)]
pub struct ResilienceContextPool {
    contexts: Mutex<Vec<ResilienceContext>>,
    max_retained: usize,
}

impl Default for ResilienceContextPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETAINED)
    }
}

impl ResilienceContextPool {
    /// Creates a pool that keeps at most `max_retained` idle contexts.
    #[must_use]
    pub fn new(max_retained: usize) -> Self {
        Self {
            contexts: Mutex::new(Vec::new()),
            max_retained,
        }
    }

    /// Acquires a context with a fresh cancellation token.
    #[must_use]
    pub fn get(&self) -> PooledContext<'_> {
        let context = self.contexts.lock().expect(ERR_POISONED_LOCK).pop().unwrap_or_default();

        PooledContext {
            pool: self,
            context: Some(context),
        }
    }

    /// Acquires a context observing the given cancellation token.
    #[must_use]
    pub fn get_with(&self, token: CancellationToken) -> PooledContext<'_> {
        let mut pooled = self.get();
        pooled.set_cancellation(token);
        pooled
    }

    /// Returns the number of idle contexts currently retained.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.contexts.lock().expect(ERR_POISONED_LOCK).len()
    }

    fn release(&self, mut context: ResilienceContext) {
        context.reset();

        let mut contexts = self.contexts.lock().expect(ERR_POISONED_LOCK);
        if contexts.len() < self.max_retained {
            contexts.push(context);
        }
    }
}

/// A context borrowed from a [`ResilienceContextPool`].
pub struct PooledContext<'a> {
    pool: &'a ResilienceContextPool,
    context: Option<ResilienceContext>,
}

impl Debug for PooledContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledContext").field(&self.context).finish()
    }
}

impl Deref for PooledContext<'_> {
    type Target = ResilienceContext;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` takes the context out.
        self.context.as_ref().unwrap_or_else(|| unreachable!("pooled context already released"))
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context.as_mut().unwrap_or_else(|| unreachable!("pooled context already released"))
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.release(context);
        }
    }
}
