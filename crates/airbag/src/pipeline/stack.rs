// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tower_layer::Layer;

use super::Pipeline;

/// Composes a tuple of layers ending in a leaf service into a single service.
///
/// The first element is the outermost strategy and the last element is the leaf. A one-element
/// tuple is the identity composition: building it yields the leaf itself.
///
/// ```
/// use airbag::{Execute, Outcome, ResilienceContext, Stack};
///
/// let pipeline = (Execute::new(|_ctx: &mut ResilienceContext, v: u32| async move { Ok::<_, airbag::Error<()>>(v) }),)
///     .into_pipeline();
///
/// let outcome: Outcome<u32, ()> = futures::executor::block_on(pipeline.execute(7));
/// assert_eq!(outcome, Ok(7));
/// ```
pub trait Stack {
    /// The composed service.
    type Service;

    /// Wraps the leaf with every layer, outermost first.
    fn build(self) -> Self::Service;

    /// Builds the service and wraps it in an executable [`Pipeline`].
    fn into_pipeline(self) -> Pipeline<Self::Service>
    where
        Self: Sized,
    {
        Pipeline::new(self.build())
    }
}

macro_rules! impl_stack {
    ($leaf:ident) => {
        impl<$leaf> Stack for ($leaf,) {
            type Service = $leaf;

            fn build(self) -> Self::Service {
                self.0
            }
        }
    };
    ($outer:ident, $($rest:ident),+) => {
        impl<$outer, $($rest),+> Stack for ($outer, $($rest),+)
        where
            ($($rest,)+): Stack,
            $outer: Layer<<($($rest,)+) as Stack>::Service>,
        {
            type Service = <$outer as Layer<<($($rest,)+) as Stack>::Service>>::Service;

            #[expect(non_snake_case, reason = "type parameters double as bindings")]
            fn build(self) -> Self::Service {
                let ($outer, $($rest),+) = self;
                $outer.layer(($($rest,)+).build())
            }
        }

        impl_stack!($($rest),+);
    };
}

impl_stack!(L1, L2, L3, L4, L5, L6, L7, L8, L9, L10);

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::executor::block_on;

    use super::*;
    use crate::{ResilienceContext, Service};

    /// Appends its label to the output on the way out.
    #[derive(Clone)]
    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    struct Tagged<S> {
        label: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
        inner: S,
    }

    impl<S> Layer<S> for Tag {
        type Service = Tagged<S>;

        fn layer(&self, inner: S) -> Self::Service {
            Tagged {
                label: self.0,
                order: Arc::clone(&self.1),
                inner,
            }
        }
    }

    impl<S: Service<u32, Out = u32>> Service<u32> for Tagged<S> {
        type Out = u32;

        async fn execute(&self, context: &mut ResilienceContext, input: u32) -> Self::Out {
            self.order.lock().unwrap().push(self.label);
            self.inner.execute(context, input).await
        }
    }

    #[test]
    fn first_element_is_outermost() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let service = (
            Tag("outer", Arc::clone(&order)),
            Tag("middle", Arc::clone(&order)),
            Tag("inner", Arc::clone(&order)),
            crate::Execute::new(|_ctx: &mut ResilienceContext, v: u32| async move { v + 1 }),
        )
            .build();

        let mut context = ResilienceContext::new();
        assert_eq!(block_on(service.execute(&mut context, 1)), 2);
        assert_eq!(*order.lock().unwrap(), vec!["outer", "middle", "inner"]);
    }

    #[test]
    fn single_element_is_identity() {
        let leaf = crate::Execute::new(|_ctx: &mut ResilienceContext, v: u32| async move { v * 3 });
        let service = (leaf,).build();

        let mut context = ResilienceContext::new();
        assert_eq!(block_on(service.execute(&mut context, 3)), 9);
    }
}
