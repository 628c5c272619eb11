//! Applies CPU and memory settings.

use super::Step;
use crate::config::HardwareConfig;
use crate::context::StateBag;
use crate::core::StepAction;
use crate::driver::HardwareSpec;
use async_trait::async_trait;
use tracing::debug;

/// Reconfigures CPU, memory and reservations when any are set.
///
/// Partially applied settings are left in place on failure.
#[derive(Debug, Clone)]
pub struct ConfigureHardware {
    config: HardwareConfig,
}

impl ConfigureHardware {
    /// Creates the step.
    #[must_use]
    pub fn new(config: HardwareConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Step for ConfigureHardware {
    fn name(&self) -> &str {
        "configure_hardware"
    }

    async fn run(&self, state: &mut StateBag) -> StepAction {
        if self.config.is_default() {
            debug!("hardware section empty, leaving VM untouched");
            return StepAction::Continue;
        }
        let (driver, vm) = match state.driver().and_then(|d| state.vm().map(|vm| (d, vm))) {
            Ok(pair) => pair,
            Err(err) => return state.fail(err),
        };

        state.ui().say("Customizing hardware parameters...");
        match driver.reconfigure(&vm, &HardwareSpec::from(&self.config)).await {
            Ok(()) => StepAction::Continue,
            Err(err) => state.fail(err),
        }
    }
}
