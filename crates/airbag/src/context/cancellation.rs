// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(any(feature = "timeout", test))]

use std::ops::{Deref, DerefMut};

use tokio_util::sync::CancellationToken;

use super::ResilienceContext;

/// Installs a substitute cancellation token on a context for the lifetime of the scope.
///
/// The original token is put back when the scope is dropped, which covers normal returns,
/// early returns, panics and futures dropped mid-flight.
#[derive(Debug)]
pub(crate) struct CancellationScope<'a> {
    context: &'a mut ResilienceContext,
    original: Option<CancellationToken>,
}

impl<'a> CancellationScope<'a> {
    pub fn enter(context: &'a mut ResilienceContext, token: CancellationToken) -> Self {
        let original = context.replace_cancellation(token);

        Self {
            context,
            original: Some(original),
        }
    }
}

impl Deref for CancellationScope<'_> {
    type Target = ResilienceContext;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for CancellationScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for CancellationScope<'_> {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            self.context.set_cancellation(original);
        }
    }
}
