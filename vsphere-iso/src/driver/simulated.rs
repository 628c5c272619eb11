//! In-process vCenter model.
//!
//! Used for dry runs and throughout the test-suite. It keeps VMs, their power
//! state, snapshots and template flag in memory, journals every call and can
//! be told to fail any operation.

use super::types::{HardwareSpec, PowerState, VmRef, VmSpec};
use super::{Connector, Driver};
use crate::cancellation::CancellationToken;
use crate::config::ConnectConfig;
use crate::errors::{BuildError, BuildResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Driver operations, used for call journaling and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Session login.
    Connect,
    /// VM creation.
    CreateVm,
    /// Hardware reconfiguration.
    Reconfigure,
    /// Power on.
    PowerOn,
    /// Guest address wait.
    WaitForIp,
    /// Hard power off.
    PowerOff,
    /// Graceful guest shutdown request.
    ShutdownGuest,
    /// Power state query.
    PowerState,
    /// Snapshot creation.
    CreateSnapshot,
    /// Template conversion.
    MarkAsTemplate,
    /// VM deletion.
    DestroyVm,
}

impl Operation {
    /// Operation name as used in driver errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::CreateVm => "create_vm",
            Self::Reconfigure => "reconfigure",
            Self::PowerOn => "power_on",
            Self::WaitForIp => "wait_for_ip",
            Self::PowerOff => "power_off",
            Self::ShutdownGuest => "shutdown_guest",
            Self::PowerState => "power_state",
            Self::CreateSnapshot => "create_snapshot",
            Self::MarkAsTemplate => "mark_as_template",
            Self::DestroyVm => "destroy_vm",
        }
    }
}

/// One journaled driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCall {
    /// The operation invoked.
    pub operation: Operation,
    /// VM id or endpoint the call targeted.
    pub target: String,
}

/// How the simulated guest reacts to a shutdown request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GuestBehavior {
    /// Powers off after `shutdown_polls` power-state queries.
    #[default]
    Cooperative,
    /// Never powers off on its own.
    IgnoresShutdown,
}

/// A VM held by the simulated endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedVm {
    /// Reference handed to callers.
    pub vm: VmRef,
    /// The creation spec.
    pub spec: VmSpec,
    /// Current power state.
    pub power: PowerState,
    /// Last applied reconfiguration.
    pub hardware: Option<HardwareSpec>,
    /// Snapshot names, oldest first.
    pub snapshots: Vec<String>,
    /// Whether the VM is a template.
    pub template: bool,
    /// Address reported while powered on.
    pub ip: String,
    /// Remaining polls before a requested shutdown completes.
    shutdown_pending: Option<u32>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u32,
    vms: BTreeMap<String, SimulatedVm>,
    calls: Vec<DriverCall>,
    failures: HashMap<Operation, String>,
    guest: GuestBehavior,
    shutdown_polls: u32,
    ip_delay: Duration,
}

/// The simulated endpoint. Cheap to share behind an `Arc`.
pub struct SimulatedDriver {
    inner: Mutex<Inner>,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1000,
                shutdown_polls: 1,
                ..Inner::default()
            }),
        }
    }
}

impl fmt::Debug for SimulatedDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SimulatedDriver")
            .field("vms", &inner.vms.len())
            .field("calls", &inner.calls.len())
            .finish()
    }
}

impl SimulatedDriver {
    /// Creates an empty endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call of `operation` fail with `message`.
    #[must_use]
    pub fn with_failure(self, operation: Operation, message: impl Into<String>) -> Self {
        self.fail_on(operation, message);
        self
    }

    /// Sets the guest's shutdown behaviour.
    #[must_use]
    pub fn with_guest_behavior(self, behavior: GuestBehavior) -> Self {
        self.inner.lock().guest = behavior;
        self
    }

    /// Sets how many power-state polls a cooperative shutdown takes.
    #[must_use]
    pub fn with_shutdown_polls(self, polls: u32) -> Self {
        self.inner.lock().shutdown_polls = polls;
        self
    }

    /// Delays the guest address by `delay` after power on.
    #[must_use]
    pub fn with_ip_delay(self, delay: Duration) -> Self {
        self.inner.lock().ip_delay = delay;
        self
    }

    /// Injects a failure at runtime.
    pub fn fail_on(&self, operation: Operation, message: impl Into<String>) {
        self.inner.lock().failures.insert(operation, message.into());
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self, operation: Operation) {
        self.inner.lock().failures.remove(&operation);
    }

    /// Returns every journaled call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<DriverCall> {
        self.inner.lock().calls.clone()
    }

    /// Returns how many times `operation` was invoked.
    #[must_use]
    pub fn call_count(&self, operation: Operation) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Returns the operations invoked, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.inner.lock().calls.iter().map(|c| c.operation).collect()
    }

    /// Returns a copy of the VM with the given id.
    #[must_use]
    pub fn vm(&self, id: &str) -> Option<SimulatedVm> {
        self.inner.lock().vms.get(id).cloned()
    }

    /// Returns a copy of the VM with the given inventory name.
    #[must_use]
    pub fn vm_named(&self, name: &str) -> Option<SimulatedVm> {
        self.inner
            .lock()
            .vms
            .values()
            .find(|v| v.vm.name == name)
            .cloned()
    }

    /// Returns the number of VMs on the endpoint.
    #[must_use]
    pub fn vm_count(&self) -> usize {
        self.inner.lock().vms.len()
    }

    /// Journals the call and returns the injected failure, if any.
    fn begin(&self, operation: Operation, target: &str) -> BuildResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall {
            operation,
            target: target.to_string(),
        });
        debug!(operation = operation.as_str(), target, "simulated driver call");
        match inner.failures.get(&operation) {
            Some(message) => Err(BuildError::driver(operation.as_str(), message.clone())),
            None => Ok(()),
        }
    }

    fn with_vm<T>(
        &self,
        operation: Operation,
        vm: &VmRef,
        f: impl FnOnce(&mut SimulatedVm, &Inner) -> BuildResult<T>,
    ) -> BuildResult<T> {
        let mut inner = self.inner.lock();
        let mut entry = inner
            .vms
            .remove(&vm.id)
            .ok_or_else(|| BuildError::driver(operation.as_str(), format!("VM '{}' not found", vm.id)))?;
        let result = f(&mut entry, &inner);
        inner.vms.insert(vm.id.clone(), entry);
        result
    }
}

#[async_trait]
impl Driver for SimulatedDriver {
    async fn create_vm(&self, spec: &VmSpec) -> BuildResult<VmRef> {
        self.begin(Operation::CreateVm, &spec.name)?;
        let mut inner = self.inner.lock();
        if inner.vms.values().any(|v| v.vm.name == spec.name) {
            return Err(BuildError::driver(
                Operation::CreateVm.as_str(),
                format!("The name '{}' already exists.", spec.name),
            ));
        }

        inner.next_id += 1;
        let id = format!("vm-{}", inner.next_id);
        let vm = VmRef::new(id.clone(), spec.name.clone());
        let ip = format!("10.0.{}.{}", inner.next_id / 250, inner.next_id % 250 + 2);
        inner.vms.insert(
            id,
            SimulatedVm {
                vm: vm.clone(),
                spec: spec.clone(),
                power: PowerState::PoweredOff,
                hardware: None,
                snapshots: Vec::new(),
                template: false,
                ip,
                shutdown_pending: None,
            },
        );
        Ok(vm)
    }

    async fn reconfigure(&self, vm: &VmRef, spec: &HardwareSpec) -> BuildResult<()> {
        self.begin(Operation::Reconfigure, &vm.id)?;
        self.with_vm(Operation::Reconfigure, vm, |entry, _| {
            if let Some(cpus) = spec.cpus {
                entry.spec.cpus = cpus;
            }
            if let Some(memory) = spec.memory_mb {
                entry.spec.memory_mb = memory;
            }
            entry.hardware = Some(*spec);
            Ok(())
        })
    }

    async fn power_on(&self, vm: &VmRef) -> BuildResult<()> {
        self.begin(Operation::PowerOn, &vm.id)?;
        self.with_vm(Operation::PowerOn, vm, |entry, _| {
            if entry.template {
                return Err(BuildError::driver(
                    Operation::PowerOn.as_str(),
                    "templates cannot be powered on",
                ));
            }
            entry.power = PowerState::PoweredOn;
            Ok(())
        })
    }

    async fn wait_for_ip(&self, vm: &VmRef, cancel: &CancellationToken) -> BuildResult<String> {
        self.begin(Operation::WaitForIp, &vm.id)?;
        let delay = self.inner.lock().ip_delay;
        if !delay.is_zero() {
            cancel.sleep(delay).await?;
        }
        self.with_vm(Operation::WaitForIp, vm, |entry, _| {
            if entry.power == PowerState::PoweredOn {
                Ok(entry.ip.clone())
            } else {
                Err(BuildError::driver(
                    Operation::WaitForIp.as_str(),
                    "VM is not powered on",
                ))
            }
        })
    }

    async fn power_off(&self, vm: &VmRef) -> BuildResult<()> {
        self.begin(Operation::PowerOff, &vm.id)?;
        self.with_vm(Operation::PowerOff, vm, |entry, _| {
            if entry.power == PowerState::PoweredOff {
                return Err(BuildError::driver(
                    Operation::PowerOff.as_str(),
                    "The attempted operation cannot be performed in the current state (Powered off).",
                ));
            }
            entry.power = PowerState::PoweredOff;
            entry.shutdown_pending = None;
            Ok(())
        })
    }

    async fn shutdown_guest(&self, vm: &VmRef) -> BuildResult<()> {
        self.begin(Operation::ShutdownGuest, &vm.id)?;
        self.with_vm(Operation::ShutdownGuest, vm, |entry, inner| {
            if entry.power != PowerState::PoweredOn {
                return Err(BuildError::driver(
                    Operation::ShutdownGuest.as_str(),
                    "VM is not powered on",
                ));
            }
            if inner.guest == GuestBehavior::Cooperative {
                entry.shutdown_pending = Some(inner.shutdown_polls);
            }
            Ok(())
        })
    }

    async fn power_state(&self, vm: &VmRef) -> BuildResult<PowerState> {
        self.begin(Operation::PowerState, &vm.id)?;
        self.with_vm(Operation::PowerState, vm, |entry, _| {
            if let Some(remaining) = entry.shutdown_pending {
                if remaining <= 1 {
                    entry.power = PowerState::PoweredOff;
                    entry.shutdown_pending = None;
                } else {
                    entry.shutdown_pending = Some(remaining - 1);
                }
            }
            Ok(entry.power)
        })
    }

    async fn create_snapshot(&self, vm: &VmRef, name: &str) -> BuildResult<()> {
        self.begin(Operation::CreateSnapshot, &vm.id)?;
        self.with_vm(Operation::CreateSnapshot, vm, |entry, _| {
            entry.snapshots.push(name.to_string());
            Ok(())
        })
    }

    async fn mark_as_template(&self, vm: &VmRef) -> BuildResult<()> {
        self.begin(Operation::MarkAsTemplate, &vm.id)?;
        self.with_vm(Operation::MarkAsTemplate, vm, |entry, _| {
            if entry.power != PowerState::PoweredOff {
                return Err(BuildError::driver(
                    Operation::MarkAsTemplate.as_str(),
                    "VM must be powered off",
                ));
            }
            entry.template = true;
            Ok(())
        })
    }

    async fn destroy_vm(&self, vm: &VmRef) -> BuildResult<()> {
        self.begin(Operation::DestroyVm, &vm.id)?;
        let mut inner = self.inner.lock();
        match inner.vms.get(&vm.id) {
            None => Err(BuildError::driver(
                Operation::DestroyVm.as_str(),
                format!("VM '{}' not found", vm.id),
            )),
            Some(entry) if entry.power == PowerState::PoweredOn => Err(BuildError::driver(
                Operation::DestroyVm.as_str(),
                "The attempted operation cannot be performed in the current state (Powered on).",
            )),
            Some(_) => {
                inner.vms.remove(&vm.id);
                Ok(())
            }
        }
    }
}

/// Connector that hands out a shared [`SimulatedDriver`].
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    driver: Arc<SimulatedDriver>,
}

impl SimulatedConnector {
    /// Creates a connector for the given endpoint.
    #[must_use]
    pub fn new(driver: Arc<SimulatedDriver>) -> Self {
        Self { driver }
    }

    /// Returns the underlying endpoint.
    #[must_use]
    pub fn driver(&self) -> Arc<SimulatedDriver> {
        Arc::clone(&self.driver)
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(&self, config: &ConnectConfig) -> BuildResult<Arc<dyn Driver>> {
        self.driver.begin(Operation::Connect, &config.sdk_url())?;
        if config.username.is_empty() || config.password.is_empty() {
            return Err(BuildError::driver(
                Operation::Connect.as_str(),
                "ServerFaultCode: Cannot complete login due to an incorrect user name or password.",
            ));
        }
        let driver: Arc<dyn Driver> = self.driver.clone();
        Ok(driver)
    }
}
