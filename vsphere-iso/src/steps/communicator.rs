//! Waits for the guest's communicator port.

use super::Step;
use crate::context::StateBag;
use crate::core::StepAction;
use crate::errors::BuildError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info};

/// Probes `ip:port` with TCP connects until one succeeds or the timeout
/// elapses.
#[derive(Debug, Clone)]
pub struct WaitForCommunicator {
    port: u16,
    timeout: Duration,
    interval: Duration,
}

impl WaitForCommunicator {
    /// Creates the step.
    #[must_use]
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            interval: Duration::from_secs(1),
        }
    }

    /// Sets the delay between connection attempts.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[async_trait]
impl Step for WaitForCommunicator {
    fn name(&self) -> &str {
        "wait_for_communicator"
    }

    async fn run(&self, state: &mut StateBag) -> StepAction {
        let addr = match state.ip() {
            Ok(ip) => format!("{ip}:{}", self.port),
            Err(err) => return state.fail(err),
        };
        let cancel = state.cancellation().clone();
        let deadline = Instant::now() + self.timeout;

        state.ui().say("Waiting for SSH to become available...");
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let probe = tokio::time::timeout(remaining.min(self.interval), TcpStream::connect(&addr));
            match probe.await {
                Ok(Ok(_)) => {
                    info!(addr = %addr, attempts, "communicator reachable");
                    state.ui().say("Connected to SSH!");
                    return StepAction::Continue;
                }
                Ok(Err(err)) => debug!(addr = %addr, error = %err, "communicator not ready"),
                Err(_) => debug!(addr = %addr, "communicator probe timed out"),
            }

            if Instant::now() >= deadline {
                return state.fail(BuildError::Timeout(format!(
                    "Timeout waiting for SSH on {addr} after {}s.",
                    self.timeout.as_secs()
                )));
            }
            let pause = self.interval.min(deadline.saturating_duration_since(Instant::now()));
            if let Err(err) = cancel.sleep(pause).await {
                return state.abort(err);
            }
        }
    }
}
