// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use tower_layer::{Identity, Layer};

use super::Pipeline;

/// Accumulates strategy layers and composes them around a leaf.
///
/// Layers wrap each other in the order they are added: the first added layer is the outermost
/// strategy and observes the final outcome last. Building without any layer yields a pipeline
/// that calls the leaf directly.
///
/// ```
/// use airbag::{Execute, Outcome, PipelineBuilder, ResilienceContext};
///
/// let pipeline = PipelineBuilder::new()
///     .build(Execute::new(|_ctx: &mut ResilienceContext, v: u32| async move { Ok::<_, airbag::Error<()>>(v) }));
///
/// let outcome: Outcome<u32, ()> = futures::executor::block_on(pipeline.execute(1));
/// assert_eq!(outcome, Ok(1));
/// ```
#[derive(Clone)]
pub struct PipelineBuilder<L> {
    layer: L,
}

impl PipelineBuilder<Identity> {
    /// Creates a builder without any strategy.
    #[must_use]
    pub fn new() -> Self {
        Self { layer: Identity::new() }
    }
}

impl Default for PipelineBuilder<Identity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> PipelineBuilder<L> {
    /// Adds a strategy inside all previously added ones.
    #[must_use]
    pub fn add<T>(self, layer: T) -> PipelineBuilder<tower_layer::Stack<T, L>> {
        PipelineBuilder {
            layer: tower_layer::Stack::new(layer, self.layer),
        }
    }

    /// Composes the strategies around `leaf` without wrapping the result in a [`Pipeline`].
    pub fn build_service<S>(self, leaf: S) -> L::Service
    where
        L: Layer<S>,
    {
        self.layer.layer(leaf)
    }

    /// Composes the strategies around `leaf` into an executable pipeline.
    pub fn build<S>(self, leaf: S) -> Pipeline<L::Service>
    where
        L: Layer<S>,
    {
        Pipeline::new(self.build_service(leaf))
    }
}

impl<L> Debug for PipelineBuilder<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder").finish_non_exhaustive()
    }
}
