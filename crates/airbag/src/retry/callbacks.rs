// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::{CloneArgs, DelayGeneratorArgs, OnRetryArgs, ShouldRetryArgs};

crate::define_fn_wrapper!(CloneInput<In>(Fn(&mut In, CloneArgs) -> Option<In>));
crate::define_fn_wrapper!(ShouldRetry<Out>(Fn(&Out, ShouldRetryArgs) -> bool));
crate::define_fn_wrapper!(DelayGenerator<Out>(Fn(&Out, DelayGeneratorArgs) -> Option<Duration>));
crate::define_fn_wrapper!(OnRetry<Out>(Fn(&Out, OnRetryArgs)));
