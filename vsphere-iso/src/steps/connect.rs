//! Opens the vCenter session.

use super::Step;
use crate::config::ConnectConfig;
use crate::context::StateBag;
use crate::core::StepAction;
use crate::driver::Connector;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Logs in to the endpoint and stores the session as `driver`.
///
/// Creates nothing on the endpoint, so there is nothing to clean up.
pub struct Connect {
    config: ConnectConfig,
    connector: Arc<dyn Connector>,
}

impl Connect {
    /// Creates the step.
    #[must_use]
    pub fn new(config: ConnectConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }
}

impl fmt::Debug for Connect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connect")
            .field("server", &self.config.vcenter_server)
            .field("datacenter", &self.config.datacenter)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Step for Connect {
    fn name(&self) -> &str {
        "connect"
    }

    async fn run(&self, state: &mut StateBag) -> StepAction {
        info!(server = %self.config.vcenter_server, "connecting to vCenter");
        match self.connector.connect(&self.config).await {
            Ok(driver) => {
                state.set_driver(driver);
                StepAction::Continue
            }
            Err(err) => state.fail(err),
        }
    }
}
