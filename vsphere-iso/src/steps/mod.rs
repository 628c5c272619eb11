//! Step trait and the provisioning steps.
//!
//! Steps are the units of work the runner drives. They hold only their own
//! configuration; everything produced during a run lives in the
//! [`StateBag`].

mod communicator;
mod connect;
mod create_vm;
mod hardware;
mod power_on;
mod provision;
mod shutdown;
mod snapshot;
mod template;

pub use communicator::WaitForCommunicator;
pub use connect::Connect;
pub use create_vm::CreateVm;
pub use hardware::ConfigureHardware;
pub use power_on::PowerOnAndWaitForAddress;
pub use provision::ProvisionGuest;
pub use shutdown::ShutdownGuest;
pub use snapshot::CreateSnapshot;
pub use template::ConvertToTemplate;

use crate::context::StateBag;
use crate::core::StepAction;
use crate::errors::BuildResult;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for build steps.
///
/// `run` either returns [`StepAction::Continue`] having written whatever
/// later steps need, or records the cause in the state bag and returns
/// `Halt` or `Cancel`. `cleanup` is invoked only for steps whose `run`
/// returned `Continue`, and only when the build ends abnormally.
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Returns the name of the step.
    fn name(&self) -> &str;

    /// Performs the step's forward effect.
    async fn run(&self, state: &mut StateBag) -> StepAction;

    /// Compensates for the forward effect.
    ///
    /// Must be safe to call when the forward effect only partly happened.
    /// Errors are reported by the runner and never change how the build ended.
    async fn cleanup(&self, _state: &mut StateBag) -> BuildResult<()> {
        Ok(())
    }
}
