//! Step outcome and run outcome enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a step tells the runner after its `run` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Proceed to the next step.
    Continue,
    /// Stop; an error has been recorded in the build state.
    Halt,
    /// Stop; cooperative cancellation was observed.
    Cancel,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Halt => write!(f, "halt"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

impl StepAction {
    /// Returns true if the runner should stop iterating.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Continue)
    }
}

/// How a whole run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every step returned `Continue`.
    Completed,
    /// A step recorded an error and halted.
    Failed,
    /// Cancellation was observed by the runner or a step.
    Cancelled,
    /// A step halted without recording an error.
    Halted,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

impl RunOutcome {
    /// Returns true if the run finished every step.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_action_display() {
        assert_eq!(StepAction::Continue.to_string(), "continue");
        assert_eq!(StepAction::Halt.to_string(), "halt");
        assert_eq!(StepAction::Cancel.to_string(), "cancel");
    }

    #[test]
    fn test_step_action_is_terminal() {
        assert!(!StepAction::Continue.is_terminal());
        assert!(StepAction::Halt.is_terminal());
        assert!(StepAction::Cancel.is_terminal());
    }

    #[test]
    fn test_run_outcome_serialize() {
        let json = serde_json::to_string(&RunOutcome::Cancelled).unwrap();
        assert_eq!(json, r#""cancelled""#);
        assert!(RunOutcome::Completed.is_success());
        assert!(!RunOutcome::Halted.is_success());
    }
}
