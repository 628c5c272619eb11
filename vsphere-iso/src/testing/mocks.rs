//! Scripted steps for exercising the runner.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::context::StateBag;
use crate::core::StepAction;
use crate::errors::{BuildError, BuildResult};
use crate::steps::Step;

/// Shared, ordered record of `run:<step>` and `cleanup:<step>` calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns every entry, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the steps whose cleanup ran, in order.
    #[must_use]
    pub fn cleanups(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix("cleanup:").map(str::to_string))
            .collect()
    }

    /// Returns the steps whose run was invoked, in order.
    #[must_use]
    pub fn runs(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix("run:").map(str::to_string))
            .collect()
    }
}

#[derive(Debug, Clone)]
enum CleanupBehavior {
    Succeed,
    Fail(String),
    Panic,
}

/// A step that logs its calls and returns a scripted action.
#[derive(Debug)]
pub struct ScriptedStep {
    name: String,
    log: CallLog,
    action: StepAction,
    error: Option<String>,
    cancel_after: Option<String>,
    panic_in_run: Option<String>,
    cleanup: CleanupBehavior,
}

impl ScriptedStep {
    /// Creates a step returning `action` without recording anything.
    #[must_use]
    pub fn new(name: impl Into<String>, log: &CallLog, action: StepAction) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            action,
            error: None,
            cancel_after: None,
            panic_in_run: None,
            cleanup: CleanupBehavior::Succeed,
        }
    }

    /// Creates a step that returns `Continue`.
    #[must_use]
    pub fn continuing(name: impl Into<String>, log: &CallLog) -> Self {
        Self::new(name, log, StepAction::Continue)
    }

    /// Creates a step that records `error` and halts.
    #[must_use]
    pub fn failing(name: impl Into<String>, log: &CallLog, error: impl Into<String>) -> Self {
        Self::new(name, log, StepAction::Halt).recording_error(error)
    }

    /// Creates a step that returns `Cancel`.
    #[must_use]
    pub fn cancelling(name: impl Into<String>, log: &CallLog) -> Self {
        Self::new(name, log, StepAction::Cancel)
    }

    /// Records `error` in the state bag before returning.
    #[must_use]
    pub fn recording_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Fires the run's cancellation token before returning.
    #[must_use]
    pub fn cancelling_token(mut self, reason: impl Into<String>) -> Self {
        self.cancel_after = Some(reason.into());
        self
    }

    /// Makes cleanup return an error.
    #[must_use]
    pub fn failing_cleanup(mut self, error: impl Into<String>) -> Self {
        self.cleanup = CleanupBehavior::Fail(error.into());
        self
    }

    /// Makes run panic with `message` after logging the call.
    #[must_use]
    pub fn panicking_run(mut self, message: impl Into<String>) -> Self {
        self.panic_in_run = Some(message.into());
        self
    }

    /// Makes cleanup panic.
    #[must_use]
    pub fn panicking_cleanup(mut self) -> Self {
        self.cleanup = CleanupBehavior::Panic;
        self
    }
}

#[async_trait]
impl Step for ScriptedStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &mut StateBag) -> StepAction {
        self.log.push(format!("run:{}", self.name));
        if let Some(message) = &self.panic_in_run {
            panic!("{message}");
        }
        if let Some(error) = &self.error {
            state.fail(BuildError::Internal(error.clone()));
        }
        if let Some(reason) = &self.cancel_after {
            state.cancellation().cancel(reason.clone());
        }
        self.action
    }

    async fn cleanup(&self, _state: &mut StateBag) -> BuildResult<()> {
        self.log.push(format!("cleanup:{}", self.name));
        match &self.cleanup {
            CleanupBehavior::Succeed => Ok(()),
            CleanupBehavior::Fail(error) => Err(BuildError::Internal(error.clone())),
            CleanupBehavior::Panic => panic!("cleanup of {} panicked", self.name),
        }
    }
}
