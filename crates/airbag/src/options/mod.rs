// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod attempt;
mod backoff;
mod define_fn_wrapper;
mod pipeline_options;

pub use attempt::Attempt;
#[cfg(any(feature = "retry", test))]
pub(crate) use attempt::MaxAttempts;
pub use backoff::Backoff;
pub(crate) use define_fn_wrapper::define_fn_wrapper;
pub use pipeline_options::PipelineOptions;

/// A flag indicating that the required property is set.
#[non_exhaustive]
#[derive(Debug)]
pub struct Set;

/// A flag indicating that the required property has not been set.
#[non_exhaustive]
#[derive(Debug)]
pub struct NotSet;

define_fn_wrapper!(EnableIf<In>(Fn(&In) -> bool));

impl<In> EnableIf<In> {
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    pub fn never() -> Self {
        Self::new(|_| false)
    }
}
