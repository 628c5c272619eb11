//! Build lifecycle events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An event emitted by the runner while driving a build.
///
/// Events are consumed by an [`EventSink`](crate::events::EventSink) for
/// logging or monitoring and never influence control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEvent {
    /// The event type (e.g., "step.started", "cleanup.failed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl BuildEvent {
    /// Creates a new build event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns the payload as a JSON object, if there is one.
    #[must_use]
    pub fn payload(&self) -> Option<serde_json::Value> {
        if self.data.is_empty() {
            return None;
        }
        let map: serde_json::Map<String, serde_json::Value> =
            self.data.clone().into_iter().collect();
        Some(serde_json::Value::Object(map))
    }

    /// Creates a "step.started" event.
    #[must_use]
    pub fn step_started(step: &str) -> Self {
        Self::new("step.started").add_data("step", serde_json::json!(step))
    }

    /// Creates a "step.completed" event.
    #[must_use]
    pub fn step_completed(step: &str, duration_ms: f64) -> Self {
        Self::new("step.completed")
            .add_data("step", serde_json::json!(step))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "step.halted" event.
    #[must_use]
    pub fn step_halted(step: &str, error: Option<&str>) -> Self {
        Self::new("step.halted")
            .add_data("step", serde_json::json!(step))
            .add_data("error", serde_json::json!(error))
    }

    /// Creates a "step.cancelled" event.
    #[must_use]
    pub fn step_cancelled(step: &str, reason: &str) -> Self {
        Self::new("step.cancelled")
            .add_data("step", serde_json::json!(step))
            .add_data("reason", serde_json::json!(reason))
    }

    /// Creates a "step.skipped" event for a step whose run never started.
    #[must_use]
    pub fn step_skipped(step: &str, reason: &str) -> Self {
        Self::new("step.skipped")
            .add_data("step", serde_json::json!(step))
            .add_data("reason", serde_json::json!(reason))
    }

    /// Creates a "cleanup.completed" event.
    #[must_use]
    pub fn cleanup_completed(step: &str, duration_ms: f64) -> Self {
        Self::new("cleanup.completed")
            .add_data("step", serde_json::json!(step))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "cleanup.failed" event.
    #[must_use]
    pub fn cleanup_failed(step: &str, error: &str) -> Self {
        Self::new("cleanup.failed")
            .add_data("step", serde_json::json!(step))
            .add_data("error", serde_json::json!(error))
    }

    /// Creates a "build.finished" event.
    #[must_use]
    pub fn build_finished(run_id: &str, outcome: &str, duration_ms: f64) -> Self {
        Self::new("build.finished")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("outcome", serde_json::json!(outcome))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }
}
