// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::borrow::Cow;

use super::{SharedListener, TelemetryEvent};
use crate::{OutcomeKind, ResilienceContext, ResilienceEvent, ResilienceEventSeverity};

/// Per-strategy reporting state, created from [`PipelineOptions`][crate::PipelineOptions].
#[derive(Debug, Clone)]
pub(crate) struct TelemetryHelper {
    pub(crate) pipeline_name: Cow<'static, str>,
    pub(crate) strategy_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    #[cfg(any(feature = "logs", test))]
    pub(crate) logs_enabled: bool,
    pub(crate) listener: Option<SharedListener>,
}

impl TelemetryHelper {
    #[cfg(any(feature = "metrics", test))]
    pub fn metrics_enabled(&self) -> bool {
        self.event_reporter.is_some()
    }

    /// Increments the event counter, tagging it with the pipeline, strategy and event names
    /// followed by `attributes`.
    #[cfg(any(feature = "metrics", test))]
    pub fn report_metrics(&self, event_name: &'static str, attributes: &[opentelemetry::KeyValue]) {
        use opentelemetry::KeyValue;

        use crate::telemetry::{EVENT_NAME, PIPELINE_NAME, STRATEGY_NAME};

        let Some(reporter) = &self.event_reporter else {
            return;
        };

        let mut all = Vec::with_capacity(attributes.len() + 3);
        all.push(KeyValue::new(PIPELINE_NAME, self.pipeline_name.clone()));
        all.push(KeyValue::new(STRATEGY_NAME, self.strategy_name.clone()));
        all.push(KeyValue::new(EVENT_NAME, event_name));
        all.extend_from_slice(attributes);

        reporter.add(1, &all);
    }

    /// Records `event` on the execution context and forwards it to the listener.
    pub fn report(&self, context: &mut ResilienceContext, event: ResilienceEvent, outcome: Option<OutcomeKind>, arguments: &dyn Any) {
        if event.severity() == ResilienceEventSeverity::None {
            return;
        }

        context.add_event(event);
        self.write(Some(context), event, outcome, arguments);
    }

    /// Forwards an event that is not tied to any execution to the listener.
    #[cfg(any(feature = "circuit-breaker", test))]
    pub fn report_detached(&self, event: ResilienceEvent, arguments: &dyn Any) {
        if event.severity() == ResilienceEventSeverity::None {
            return;
        }

        self.write(None, event, None, arguments);
    }

    fn write(&self, context: Option<&ResilienceContext>, event: ResilienceEvent, outcome: Option<OutcomeKind>, arguments: &dyn Any) {
        if let Some(listener) = &self.listener {
            listener.write(&TelemetryEvent {
                event,
                pipeline_name: &self.pipeline_name,
                strategy_name: &self.strategy_name,
                context,
                outcome,
                arguments,
            });
        }
    }
}
