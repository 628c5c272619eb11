//! Typed state shared by the steps of one build.

use super::RunIdentity;
use crate::cancellation::CancellationToken;
use crate::core::StepAction;
use crate::driver::{Driver, VmRef};
use crate::errors::{BuildError, BuildResult};
use crate::ui::Ui;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Why a run stopped early.
#[derive(Debug)]
pub enum TerminalState {
    /// A step recorded an error.
    Failed(BuildError),
    /// Cancellation was observed.
    Cancelled(String),
    /// A step halted without recording an error.
    Halted,
}

impl TerminalState {
    /// Converts the marker into the error surfaced to the caller.
    #[must_use]
    pub fn into_error(self) -> BuildError {
        match self {
            Self::Failed(err) => err,
            Self::Cancelled(reason) => BuildError::Cancelled(reason),
            Self::Halted => BuildError::Halted,
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "failed: {err}"),
            Self::Cancelled(reason) => write!(f, "cancelled: {reason}"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

/// The state bag passed to every step.
///
/// Steps communicate only through the typed slots here. Each slot has a
/// presence-checked accessor so a step running out of order fails with
/// [`BuildError::MissingState`] instead of misbehaving.
///
/// The terminal marker is set once: the first failure, cancellation or halt
/// wins and later attempts are ignored.
pub struct StateBag {
    identity: RunIdentity,
    ui: Arc<dyn Ui>,
    cancel: Arc<CancellationToken>,
    driver: Option<Arc<dyn Driver>>,
    vm: Option<VmRef>,
    ip: Option<String>,
    terminal: Option<TerminalState>,
}

impl StateBag {
    /// Creates an empty state bag reporting to `ui`.
    #[must_use]
    pub fn new(ui: Arc<dyn Ui>) -> Self {
        Self {
            identity: RunIdentity::new(),
            ui,
            cancel: Arc::new(CancellationToken::new()),
            driver: None,
            vm: None,
            ip: None,
            terminal: None,
        }
    }

    /// Sets the run identity.
    #[must_use]
    pub fn with_identity(mut self, identity: RunIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Shares an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the output sink.
    #[must_use]
    pub fn ui(&self) -> &Arc<dyn Ui> {
        &self.ui
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Stores the driver session.
    pub fn set_driver(&mut self, driver: Arc<dyn Driver>) {
        self.driver = Some(driver);
    }

    /// Returns the driver session.
    pub fn driver(&self) -> BuildResult<Arc<dyn Driver>> {
        self.driver.clone().ok_or(BuildError::MissingState("driver"))
    }

    /// Stores the created VM.
    pub fn set_vm(&mut self, vm: VmRef) {
        self.vm = Some(vm);
    }

    /// Returns the created VM.
    pub fn vm(&self) -> BuildResult<VmRef> {
        self.vm.clone().ok_or(BuildError::MissingState("vm"))
    }

    /// Returns the created VM without treating absence as an error.
    #[must_use]
    pub fn vm_opt(&self) -> Option<&VmRef> {
        self.vm.as_ref()
    }

    /// Stores the guest address.
    pub fn set_ip(&mut self, ip: impl Into<String>) {
        self.ip = Some(ip.into());
    }

    /// Returns the guest address.
    pub fn ip(&self) -> BuildResult<&str> {
        self.ip.as_deref().ok_or(BuildError::MissingState("ip"))
    }

    /// Records the terminal marker unless one is already present.
    ///
    /// Returns false if the marker was already set.
    pub fn record(&mut self, state: TerminalState) -> bool {
        if let Some(existing) = &self.terminal {
            debug!(kept = %existing, ignored = %state, "terminal state already recorded");
            return false;
        }
        self.terminal = Some(state);
        true
    }

    /// Records `err` and returns [`StepAction::Halt`].
    pub fn fail(&mut self, err: BuildError) -> StepAction {
        self.record(TerminalState::Failed(err));
        StepAction::Halt
    }

    /// Records a cancellation and returns [`StepAction::Cancel`].
    pub fn cancel(&mut self, reason: impl Into<String>) -> StepAction {
        self.record(TerminalState::Cancelled(reason.into()));
        StepAction::Cancel
    }

    /// Routes an error from a collaborator: cancellation becomes
    /// [`StepAction::Cancel`], anything else [`StepAction::Halt`].
    pub fn abort(&mut self, err: BuildError) -> StepAction {
        match err {
            BuildError::Cancelled(reason) => self.cancel(reason),
            other => self.fail(other),
        }
    }

    /// Returns the terminal marker, if any.
    #[must_use]
    pub fn terminal(&self) -> Option<&TerminalState> {
        self.terminal.as_ref()
    }

    /// Removes and returns the terminal marker.
    pub fn take_terminal(&mut self) -> Option<TerminalState> {
        self.terminal.take()
    }

    /// Returns the recorded error, if the run failed.
    #[must_use]
    pub fn error(&self) -> Option<&BuildError> {
        match &self.terminal {
            Some(TerminalState::Failed(err)) => Some(err),
            _ => None,
        }
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        matches!(self.terminal, Some(TerminalState::Cancelled(_)))
    }

    /// Returns true once any terminal marker exists.
    #[must_use]
    pub fn is_abnormal(&self) -> bool {
        self.terminal.is_some()
    }
}

impl fmt::Debug for StateBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBag")
            .field("run_id", &self.identity.run_id)
            .field("driver", &self.driver.is_some())
            .field("vm", &self.vm)
            .field("ip", &self.ip)
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}
