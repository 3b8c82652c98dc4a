// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::Backoff;

/// Exponential growth relieves a struggling dependency fastest and pairs well with jitter.
pub(crate) const DEFAULT_BACKOFF: Backoff = Backoff::Exponential;

pub(crate) const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

pub(crate) const DEFAULT_USE_JITTER: bool = true;

/// Three retries on top of the initial call, four attempts in total.
pub(crate) const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
