//! Boots the VM and waits for its address.

use super::Step;
use crate::context::StateBag;
use crate::core::StepAction;
use crate::driver::{Driver, PowerState, VmRef};
use crate::errors::{BuildError, BuildResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Powers the VM on and stores the guest-tools address as `ip`.
///
/// If the VM was powered on but the address never arrived, the VM is
/// powered off again before the step returns. On abnormal termination of a
/// later step, cleanup powers the VM off if it is still running.
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerOnAndWaitForAddress;

impl PowerOnAndWaitForAddress {
    /// Creates the step.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn power_off_if_running(driver: &Arc<dyn Driver>, vm: &VmRef, state: &StateBag) -> BuildResult<()> {
        if driver.power_state(vm).await? != PowerState::PoweredOn {
            return Ok(());
        }
        state.ui().say("Power off VM...");
        driver.power_off(vm).await
    }

    /// Undoes the power-on after a failed or cancelled address wait.
    async fn unwind(driver: &Arc<dyn Driver>, vm: &VmRef, state: &mut StateBag, err: BuildError) -> StepAction {
        if let Err(off_err) = Self::power_off_if_running(driver, vm, state).await {
            warn!(vm = %vm, error = %off_err, "could not power off after address wait failed");
            state.ui().error(&off_err.to_string());
        }
        state.abort(err)
    }
}

#[async_trait]
impl Step for PowerOnAndWaitForAddress {
    fn name(&self) -> &str {
        "power_on"
    }

    async fn run(&self, state: &mut StateBag) -> StepAction {
        let (driver, vm) = match state.driver().and_then(|d| state.vm().map(|vm| (d, vm))) {
            Ok(pair) => pair,
            Err(err) => return state.fail(err),
        };

        state.ui().say("Power on VM...");
        if let Err(err) = driver.power_on(&vm).await {
            return state.fail(err);
        }

        let cancel = Arc::clone(state.cancellation());
        if cancel.is_cancelled() {
            let err = BuildError::Cancelled(cancel.reason_or_default());
            return Self::unwind(&driver, &vm, state, err).await;
        }

        state.ui().say("Waiting for IP...");
        match driver.wait_for_ip(&vm, &cancel).await {
            Ok(ip) => {
                info!(vm = %vm, ip = %ip, "guest address available");
                state.ui().say(&format!("IP address: {ip}"));
                state.set_ip(ip);
                StepAction::Continue
            }
            Err(err) => Self::unwind(&driver, &vm, state, err).await,
        }
    }

    async fn cleanup(&self, state: &mut StateBag) -> BuildResult<()> {
        if !state.is_abnormal() {
            return Ok(());
        }
        let vm = state.vm()?;
        let driver = state.driver()?;
        Self::power_off_if_running(&driver, &vm, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TerminalState;
    use crate::driver::{Operation, SimulatedDriver};
    use crate::testing::fixtures;
    use std::time::Duration;

    #[tokio::test]
    async fn test_power_on_stores_ip() {
        let sim = Arc::new(SimulatedDriver::new());
        let mut state = fixtures::state_with_vm(sim.clone()).await;

        assert_eq!(PowerOnAndWaitForAddress.run(&mut state).await, StepAction::Continue);
        assert!(state.ip().unwrap().starts_with("10.0."));
        let vm = sim.vm(&state.vm().unwrap().id).unwrap();
        assert_eq!(vm.power, PowerState::PoweredOn);
    }

    #[tokio::test]
    async fn test_address_failure_powers_off_before_halting() {
        let sim = Arc::new(SimulatedDriver::new().with_failure(Operation::WaitForIp, "no address"));
        let mut state = fixtures::state_with_vm(sim.clone()).await;

        assert_eq!(PowerOnAndWaitForAddress.run(&mut state).await, StepAction::Halt);
        assert_eq!(state.error().unwrap().to_string(), "wait_for_ip failed: no address");
        let vm = sim.vm(&state.vm().unwrap().id).unwrap();
        assert_eq!(vm.power, PowerState::PoweredOff);
    }

    #[tokio::test]
    async fn test_cancel_during_wait_returns_cancel() {
        let sim = Arc::new(SimulatedDriver::new().with_ip_delay(Duration::from_secs(30)));
        let mut state = fixtures::state_with_vm(sim.clone()).await;
        let token = Arc::clone(state.cancellation());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel("interrupt");
        });

        assert_eq!(PowerOnAndWaitForAddress.run(&mut state).await, StepAction::Cancel);
        assert!(state.was_cancelled());
        assert_eq!(sim.call_count(Operation::PowerOff), 1);
    }

    #[tokio::test]
    async fn test_cleanup_skips_powered_off_vm() {
        let sim = Arc::new(SimulatedDriver::new());
        let mut state = fixtures::state_with_vm(sim.clone()).await;
        state.record(TerminalState::Halted);

        PowerOnAndWaitForAddress.cleanup(&mut state).await.unwrap();
        assert_eq!(sim.call_count(Operation::PowerOff), 0);
    }
}
