//! Optional snapshot of the finished VM.

use super::Step;
use crate::context::StateBag;
use crate::core::StepAction;
use async_trait::async_trait;

/// Takes a named snapshot when enabled; otherwise does nothing.
#[derive(Debug, Clone)]
pub struct CreateSnapshot {
    enabled: bool,
    name: String,
}

impl CreateSnapshot {
    /// Creates the step.
    #[must_use]
    pub fn new(enabled: bool, name: impl Into<String>) -> Self {
        Self {
            enabled,
            name: name.into(),
        }
    }
}

#[async_trait]
impl Step for CreateSnapshot {
    fn name(&self) -> &str {
        "create_snapshot"
    }

    async fn run(&self, state: &mut StateBag) -> StepAction {
        if !self.enabled {
            return StepAction::Continue;
        }
        let (driver, vm) = match state.driver().and_then(|d| state.vm().map(|vm| (d, vm))) {
            Ok(pair) => pair,
            Err(err) => return state.fail(err),
        };

        state.ui().say("Creating snapshot...");
        match driver.create_snapshot(&vm, &self.name).await {
            Ok(()) => StepAction::Continue,
            Err(err) => state.fail(err),
        }
    }
}
