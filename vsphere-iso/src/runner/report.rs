//! What happened during one run.

use crate::core::RunOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cleanup that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupFailure {
    /// The step whose cleanup failed.
    pub step: String,
    /// What went wrong.
    pub message: String,
}

/// Summary of a run, returned by the runner alongside the state bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The run this report belongs to.
    pub run_id: Uuid,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Steps whose run returned `Continue`, in execution order.
    pub ran: Vec<String>,
    /// Steps whose cleanup was invoked, in invocation order.
    pub cleaned: Vec<String>,
    /// The step skipped because cancellation was observed before it started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    /// Cleanup errors; reported, never promoted to the run's outcome.
    #[serde(default)]
    pub cleanup_failures: Vec<CleanupFailure>,
    /// Wall time of the whole run.
    pub duration_ms: f64,
}

impl RunReport {
    /// Creates an empty report for a run.
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            outcome: RunOutcome::Completed,
            ran: Vec::new(),
            cleaned: Vec::new(),
            skipped: None,
            cleanup_failures: Vec::new(),
            duration_ms: 0.0,
        }
    }

    /// Returns true if every step completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Returns true if the named step's run returned `Continue`.
    #[must_use]
    pub fn did_run(&self, step: &str) -> bool {
        self.ran.iter().any(|s| s == step)
    }
}
