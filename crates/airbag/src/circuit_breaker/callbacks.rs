// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{OnCircuitClosedArgs, OnCircuitHalfOpenedArgs, OnCircuitOpenedArgs};

crate::define_fn_wrapper!(ShouldHandle<Out>(Fn(&Out) -> bool));
crate::define_fn_wrapper!(OnOpened<Out>(Fn(&Out, OnCircuitOpenedArgs)));
crate::define_fn_wrapper!(OnClosed<Out>(Fn(&Out, OnCircuitClosedArgs)));
crate::define_fn_wrapper!(OnHalfOpened<In>(Fn(&In, OnCircuitHalfOpenedArgs)));
