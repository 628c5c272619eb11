//! Optional template conversion.

use super::Step;
use crate::context::StateBag;
use crate::core::StepAction;
use async_trait::async_trait;

/// Marks the VM as a template when enabled; otherwise does nothing.
#[derive(Debug, Clone, Copy)]
pub struct ConvertToTemplate {
    enabled: bool,
}

impl ConvertToTemplate {
    /// Creates the step.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl Step for ConvertToTemplate {
    fn name(&self) -> &str {
        "convert_to_template"
    }

    async fn run(&self, state: &mut StateBag) -> StepAction {
        if !self.enabled {
            return StepAction::Continue;
        }
        let (driver, vm) = match state.driver().and_then(|d| state.vm().map(|vm| (d, vm))) {
            Ok(pair) => pair,
            Err(err) => return state.fail(err),
        };

        state.ui().say("Convert VM into template...");
        match driver.mark_as_template(&vm).await {
            Ok(()) => StepAction::Continue,
            Err(err) => state.fail(err),
        }
    }
}
