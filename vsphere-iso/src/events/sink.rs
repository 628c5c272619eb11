//! Sinks for build lifecycle events.

use crate::core::BuildEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

/// Receives the runner's lifecycle events.
///
/// Implementations must not fail and must not block for long: the runner
/// awaits each emission between steps.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Records one event.
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Records one event from synchronous code.
    fn try_emit(&self, event_type: &str, data: Option<Value>);

    /// Records a typed [`BuildEvent`].
    async fn emit_event(&self, event: BuildEvent) {
        self.emit(&event.event_type, event.payload()).await;
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Writes events to the `tracing` subscriber.
///
/// Failure events (`step.halted`, `cleanup.failed`) are always logged at
/// `WARN`; everything else uses the configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingEventSink {
    /// Creates a sink that logs routine events at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a sink that logs routine events at `DEBUG`.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn record(&self, event_type: &str, data: Option<&Value>) {
        let step = data
            .and_then(|d| d.get("step"))
            .and_then(Value::as_str)
            .unwrap_or("-");

        if matches!(event_type, "step.halted" | "cleanup.failed") {
            warn!(event = event_type, step, data = ?data, "build event");
        } else if self.level == Level::DEBUG {
            debug!(event = event_type, step, data = ?data, "build event");
        } else {
            info!(event = event_type, step, "build event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data.as_ref());
    }
}

/// One event captured by [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// The event type, e.g. `cleanup.completed`.
    pub event_type: String,
    /// The payload, if any.
    pub data: Option<Value>,
}

impl RecordedEvent {
    /// Returns the `step` field of the payload.
    pub fn step(&self) -> Option<&str> {
        self.data.as_ref()?.get("step")?.as_str()
    }

    /// Returns a payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything captured so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Returns the captured event types, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.event_type.clone()).collect()
    }

    /// Returns the steps named by events of exactly `event_type`, in order.
    #[must_use]
    pub fn steps_for(&self, event_type: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .filter_map(|e| e.step().map(str::to_string))
            .collect()
    }

    /// Returns the number of captured events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn push(&self, event_type: &str, data: Option<Value>) {
        self.events.lock().push(RecordedEvent {
            event_type: event_type.to_string(),
            data,
        });
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.push(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.push(event_type, data);
    }
}
