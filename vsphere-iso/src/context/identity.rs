//! Run identity for correlating one build's logs and events.

use crate::utils::run_uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a single build run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this run.
    pub run_id: Uuid,

    /// When the run context was created.
    pub started_at: DateTime<Utc>,

    /// The build name (the VM name), if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_name: Option<String>,
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RunIdentity {
    /// Creates a new identity with a generated run ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_run_id(run_uuid())
    }

    /// Creates an identity with a specific run ID.
    #[must_use]
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            build_name: None,
        }
    }

    /// Sets the build name.
    #[must_use]
    pub fn with_build_name(mut self, name: impl Into<String>) -> Self {
        self.build_name = Some(name.into());
        self
    }

    /// Returns the run ID as a string.
    #[must_use]
    pub fn run_id_str(&self) -> String {
        self.run_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_distinct_ids() {
        let a = RunIdentity::new();
        let b = RunIdentity::new();
        assert_ne!(a.run_id, b.run_id);
        assert!(a.build_name.is_none());
    }

    #[test]
    fn test_with_run_id() {
        let id = Uuid::new_v4();
        let identity = RunIdentity::with_run_id(id).with_build_name("base");
        assert_eq!(identity.run_id_str(), id.to_string());
        assert_eq!(identity.build_name.as_deref(), Some("base"));
    }

    #[test]
    fn test_serialization_skips_missing_name() {
        let json = serde_json::to_value(RunIdentity::new()).unwrap();
        assert!(json.get("build_name").is_none());
        assert!(json["run_id"].is_string());
    }
}
