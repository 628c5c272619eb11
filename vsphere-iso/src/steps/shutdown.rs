//! Graceful guest shutdown with a deadline.

use super::Step;
use crate::context::StateBag;
use crate::core::StepAction;
use crate::driver::PowerState;
use crate::errors::BuildError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Asks guest tools to shut down, then polls the power state until the VM
/// is off or `timeout` has elapsed.
#[derive(Debug, Clone)]
pub struct ShutdownGuest {
    timeout: Duration,
    poll_interval: Duration,
}

impl ShutdownGuest {
    /// Creates the step.
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

impl Default for ShutdownGuest {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), Duration::from_secs(1))
    }
}

#[async_trait]
impl Step for ShutdownGuest {
    fn name(&self) -> &str {
        "shutdown"
    }

    async fn run(&self, state: &mut StateBag) -> StepAction {
        let (driver, vm) = match state.driver().and_then(|d| state.vm().map(|vm| (d, vm))) {
            Ok(pair) => pair,
            Err(err) => return state.fail(err),
        };
        let cancel = state.cancellation().clone();

        state.ui().say("Shut down VM...");
        if let Err(err) = driver.shutdown_guest(&vm).await {
            return state.fail(BuildError::driver("shutdown_guest", format!("Cannot shut down VM: {err}")));
        }

        debug!(vm = %vm, timeout_s = self.timeout.as_secs(), "waiting for shutdown to complete");
        let deadline = Instant::now() + self.timeout;
        loop {
            match driver.power_state(&vm).await {
                Ok(PowerState::PoweredOff) => break,
                Ok(_) => {}
                Err(err) => return state.fail(err),
            }
            if Instant::now() >= deadline {
                return state.fail(BuildError::Timeout(
                    "Timeout while waiting for machine to shut down.".to_string(),
                ));
            }
            if let Err(err) = cancel.sleep(self.poll_interval).await {
                return state.abort(err);
            }
        }

        info!(vm = %vm, "VM stopped");
        state.ui().say("VM stopped");
        StepAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Driver, GuestBehavior, Operation, SimulatedDriver};
    use crate::testing::fixtures;
    use std::sync::Arc;

    async fn running_state(sim: Arc<SimulatedDriver>) -> StateBag {
        let state = fixtures::state_with_vm(sim.clone()).await;
        sim.power_on(&state.vm().unwrap()).await.unwrap();
        state
    }

    #[tokio::test]
    async fn test_cooperative_guest_stops() {
        let sim = Arc::new(SimulatedDriver::new().with_shutdown_polls(3));
        let mut state = running_state(sim.clone()).await;
        let step = ShutdownGuest::new(Duration::from_secs(5), Duration::from_millis(5));

        assert_eq!(step.run(&mut state).await, StepAction::Continue);
        assert_eq!(sim.call_count(Operation::PowerState), 3);
    }

    #[tokio::test]
    async fn test_unresponsive_guest_times_out() {
        let sim = Arc::new(SimulatedDriver::new().with_guest_behavior(GuestBehavior::IgnoresShutdown));
        let mut state = running_state(sim.clone()).await;
        let step = ShutdownGuest::new(Duration::from_millis(100), Duration::from_millis(10));

        let action = tokio::time::timeout(Duration::from_secs(5), step.run(&mut state))
            .await
            .unwrap();
        assert_eq!(action, StepAction::Halt);
        assert_eq!(
            state.error().unwrap().to_string(),
            "Timeout while waiting for machine to shut down."
        );
    }

    #[tokio::test]
    async fn test_rejected_request_halts() {
        let sim = Arc::new(SimulatedDriver::new());
        // VM never powered on; the endpoint refuses the request.
        let mut state = fixtures::state_with_vm(sim).await;
        let step = ShutdownGuest::default();

        assert_eq!(step.run(&mut state).await, StepAction::Halt);
        assert!(state.error().unwrap().to_string().contains("Cannot shut down VM"));
    }

    #[tokio::test]
    async fn test_cancel_during_poll() {
        let sim = Arc::new(SimulatedDriver::new().with_guest_behavior(GuestBehavior::IgnoresShutdown));
        let mut state = running_state(sim).await;
        state.cancellation().cancel("interrupt");
        let step = ShutdownGuest::new(Duration::from_secs(300), Duration::from_secs(1));

        assert_eq!(step.run(&mut state).await, StepAction::Cancel);
        assert!(state.was_cancelled());
    }
}
