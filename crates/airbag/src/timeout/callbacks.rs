// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::{OnTimeoutArgs, TimeoutGeneratorArgs};

crate::define_fn_wrapper!(OnTimeout<Out>(Fn(&Out, OnTimeoutArgs)));
crate::define_fn_wrapper!(TimeoutGenerator<In>(Fn(&In, TimeoutGeneratorArgs) -> Option<Duration>));
