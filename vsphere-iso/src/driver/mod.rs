//! Hypervisor driver boundary.
//!
//! The steps talk to vCenter only through the [`Connector`] and [`Driver`]
//! traits. Every mutating call that the endpoint runs as a task must be
//! awaited to completion before the method returns.

mod simulated;
mod types;

pub use simulated::{DriverCall, GuestBehavior, Operation, SimulatedConnector, SimulatedDriver, SimulatedVm};
pub use types::{HardwareSpec, PowerState, VmRef, VmSpec};

use crate::cancellation::CancellationToken;
use crate::config::ConnectConfig;
use crate::errors::BuildResult;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Opens authenticated sessions against a management endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Logs in and selects the configured datacenter.
    async fn connect(&self, config: &ConnectConfig) -> BuildResult<Arc<dyn Driver>>;
}

/// An authenticated session against a management endpoint.
///
/// The session is shared read-only between steps once connected; steps never
/// call it concurrently.
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    /// Creates the VM with its storage and network devices.
    async fn create_vm(&self, spec: &VmSpec) -> BuildResult<VmRef>;

    /// Applies CPU, memory and reservation settings.
    async fn reconfigure(&self, vm: &VmRef, spec: &HardwareSpec) -> BuildResult<()>;

    /// Powers the VM on.
    async fn power_on(&self, vm: &VmRef) -> BuildResult<()>;

    /// Blocks until guest tools report an IP address.
    ///
    /// Implementations poll `cancel` between attempts and return
    /// `BuildError::Cancelled` once it fires.
    async fn wait_for_ip(&self, vm: &VmRef, cancel: &CancellationToken) -> BuildResult<String>;

    /// Hard power off.
    async fn power_off(&self, vm: &VmRef) -> BuildResult<()>;

    /// Asks guest tools for a graceful shutdown. Returns once the request is accepted.
    async fn shutdown_guest(&self, vm: &VmRef) -> BuildResult<()>;

    /// Reads the current power state.
    async fn power_state(&self, vm: &VmRef) -> BuildResult<PowerState>;

    /// Creates a named snapshot (without memory, without quiescing).
    async fn create_snapshot(&self, vm: &VmRef, name: &str) -> BuildResult<()>;

    /// Marks the VM as a template.
    async fn mark_as_template(&self, vm: &VmRef) -> BuildResult<()>;

    /// Deletes the VM and its files.
    async fn destroy_vm(&self, vm: &VmRef) -> BuildResult<()>;
}
