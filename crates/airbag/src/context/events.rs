// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// The severity of a [`ResilienceEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum ResilienceEventSeverity {
    /// Not reported anywhere.
    None,
    /// Diagnostic detail.
    Debug,
    /// Expected, informational transitions such as a circuit closing.
    Information,
    /// Something went wrong but was handled, such as a retry.
    Warning,
    /// A strategy gave up on or refused an execution.
    Error,
    /// Reserved for failures that need immediate attention.
    Critical,
}

impl ResilienceEventSeverity {
    /// Returns the severity as a lowercase string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Debug => "debug",
            Self::Information => "information",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl Display for ResilienceEventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named occurrence reported by a strategy, such as a retry or a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResilienceEvent {
    name: &'static str,
    severity: ResilienceEventSeverity,
}

impl ResilienceEvent {
    /// Creates a new event.
    #[must_use]
    pub const fn new(name: &'static str, severity: ResilienceEventSeverity) -> Self {
        Self { name, severity }
    }

    /// The event name, e.g. `OnRetry`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The event severity.
    #[must_use]
    pub fn severity(&self) -> ResilienceEventSeverity {
        self.severity
    }
}

impl Display for ResilienceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.severity)
    }
}
