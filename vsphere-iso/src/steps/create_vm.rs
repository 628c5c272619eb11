//! Creates the VM.

use super::Step;
use crate::config::CreateConfig;
use crate::context::StateBag;
use crate::core::StepAction;
use crate::driver::{PowerState, VmSpec};
use crate::errors::BuildResult;
use async_trait::async_trait;
use tracing::{info, warn};

/// Creates the VM with its disk, CD-ROM and network adapter and stores it
/// as `vm`.
///
/// On abnormal termination the VM is destroyed.
#[derive(Debug, Clone)]
pub struct CreateVm {
    config: CreateConfig,
}

impl CreateVm {
    /// Creates the step.
    #[must_use]
    pub fn new(config: CreateConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Step for CreateVm {
    fn name(&self) -> &str {
        "create_vm"
    }

    async fn run(&self, state: &mut StateBag) -> StepAction {
        let driver = match state.driver() {
            Ok(d) => d,
            Err(err) => return state.fail(err),
        };
        let spec = match VmSpec::from_config(&self.config) {
            Ok(s) => s,
            Err(err) => return state.fail(err),
        };

        state.ui().say("Creating VM...");
        match driver.create_vm(&spec).await {
            Ok(vm) => {
                info!(vm = %vm, disk_bytes = spec.disk.bytes(), "VM created");
                state.set_vm(vm);
                StepAction::Continue
            }
            Err(err) => state.fail(err),
        }
    }

    async fn cleanup(&self, state: &mut StateBag) -> BuildResult<()> {
        if !state.is_abnormal() {
            return Ok(());
        }
        let Some(vm) = state.vm_opt().cloned() else {
            return Ok(());
        };
        let driver = state.driver()?;

        // Power-off is best effort; the destroy is always attempted.
        let mut first_error = None;
        match driver.power_state(&vm).await {
            Ok(PowerState::PoweredOn) => {
                warn!(vm = %vm, "VM still running during cleanup, powering off");
                if let Err(err) = driver.power_off(&vm).await {
                    warn!(vm = %vm, error = %err, "power off before destroy failed");
                    state.ui().error(&format!("Error powering off VM: {err}"));
                    first_error = Some(err);
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(vm = %vm, error = %err, "could not read power state before destroy");
                state.ui().error(&format!("Error reading VM power state: {err}"));
                first_error = Some(err);
            }
        }

        state.ui().say("Destroying VM...");
        let destroyed = driver.destroy_vm(&vm).await;
        match first_error {
            Some(err) => destroyed.and(Err(err)),
            None => destroyed,
        }
    }
}
