// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// Identifies one execution attempt made by the retry strategy.
///
/// Attempts are numbered from zero: attempt `0` is the initial call and attempt `n` is the
/// `n`-th retry. The default attempt is both the first and the last one, which describes a
/// single-shot execution.
///
/// ```
/// use airbag::Attempt;
///
/// let initial = Attempt::new(0, false);
/// assert!(initial.is_first());
///
/// let final_retry = Attempt::new(2, true);
/// assert!(final_retry.is_last());
/// assert_eq!(final_retry.index(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attempt {
    index: u32,
    is_last: bool,
}

impl Default for Attempt {
    fn default() -> Self {
        Self::new(0, true)
    }
}

impl Attempt {
    /// Creates a new attempt.
    #[must_use]
    pub fn new(index: u32, is_last: bool) -> Self {
        Self { index, is_last }
    }

    /// Returns `true` for the initial call.
    #[must_use]
    pub fn is_first(self) -> bool {
        self.index == 0
    }

    /// Returns `true` if no further attempt will be made after this one.
    #[must_use]
    pub fn is_last(self) -> bool {
        self.is_last
    }

    /// The zero-based attempt index.
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Returns the next attempt, or `None` once `max_attempts` is used up.
    #[cfg_attr(test, mutants::skip)] // causes test timeouts
    #[cfg(any(feature = "retry", test))]
    pub(crate) fn increment(self, max_attempts: MaxAttempts) -> Option<Self> {
        let next = self.index.saturating_add(1);

        match max_attempts {
            MaxAttempts::Finite(total) if next >= total => None,
            MaxAttempts::Finite(total) => Some(Self::new(next, next == total.saturating_sub(1))),
            MaxAttempts::Infinite => Some(Self::new(next, false)),
        }
    }
}

impl Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.index.fmt(f)
    }
}

/// The total number of attempts (the initial call plus retries) a retry strategy may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg(any(feature = "retry", test))]
pub(crate) enum MaxAttempts {
    Finite(u32),
    Infinite,
}

#[cfg(any(feature = "retry", test))]
impl MaxAttempts {
    /// Builds the budget for `retries` retries on top of the initial call.
    pub fn from_retries(retries: u32) -> Self {
        Self::Finite(retries.saturating_add(1))
    }

    pub fn first_attempt(self) -> Attempt {
        Attempt::new(0, matches!(self, Self::Finite(0 | 1)))
    }
}
