// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// How the delay between retry attempts grows.
///
/// The examples below use a `2s` base delay and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Backoff {
    /// Every retry waits the base delay: `2s, 2s, 2s, ...`
    Constant,

    /// The delay grows by the base delay with every retry: `2s, 4s, 6s, 8s, ...`
    Linear,

    /// The delay doubles with every retry: `2s, 4s, 8s, 16s, ...`
    ///
    /// With jitter enabled the delays follow a de-correlated jitter curve whose median
    /// approximates the doubling sequence.
    #[default]
    Exponential,
}
