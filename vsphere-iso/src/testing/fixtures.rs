//! Ready-made configurations and state bags.

use std::sync::Arc;

use crate::config::{BuildConfig, CommunicatorType, ConnectConfig, CreateConfig, DiskSize};
use crate::context::StateBag;
use crate::driver::{Driver, SimulatedDriver, VmSpec};
use crate::ui::RecordingUi;

/// Connection settings accepted by the simulated endpoint.
#[must_use]
pub fn connect_config() -> ConnectConfig {
    ConnectConfig {
        vcenter_server: "vcenter.test".into(),
        username: "builder@vsphere.local".into(),
        password: "secret".into(),
        insecure_connection: true,
        datacenter: "dc1".into(),
    }
}

/// A valid creation section for a VM named `name`.
#[must_use]
pub fn create_config(name: &str) -> CreateConfig {
    CreateConfig {
        vm_name: name.into(),
        disk_size: "20".into(),
        iso_file: "isos/base.iso".into(),
        iso_datastore: "iso-store".into(),
        datastore: "vm-store".into(),
        network: "VM Network".into(),
        ..Default::default()
    }
}

/// A creation spec for a VM named `name`.
#[must_use]
pub fn vm_spec(name: &str) -> VmSpec {
    VmSpec {
        name: name.into(),
        folder: String::new(),
        guest_os: "otherGuest".into(),
        cpus: 1,
        memory_mb: 1024,
        annotation: String::new(),
        hardware_version: None,
        disk: DiskSize::from_gib(20),
        iso: None,
        datastore: "vm-store".into(),
        resource_pool: None,
        host: None,
        cluster: None,
        network: "VM Network".into(),
        network_adapter: "vmxnet3".into(),
        mac_address: None,
    }
}

/// A complete, valid build definition that skips the guest communicator.
#[must_use]
pub fn build_config(name: &str) -> BuildConfig {
    let mut config = BuildConfig {
        connect: connect_config(),
        create: create_config(name),
        ..Default::default()
    };
    config.comm.comm_type = CommunicatorType::None;
    config
}

/// An empty state bag reporting to a fresh recorder.
#[must_use]
pub fn state_bag() -> StateBag {
    state_bag_with_ui().0
}

/// An empty state bag and the recorder it reports to.
#[must_use]
pub fn state_bag_with_ui() -> (StateBag, Arc<RecordingUi>) {
    let ui = Arc::new(RecordingUi::new());
    (StateBag::new(ui.clone()), ui)
}

/// A state bag already connected to `driver`.
#[must_use]
pub fn state_with_driver(driver: Arc<SimulatedDriver>) -> StateBag {
    let mut state = state_bag();
    state.set_driver(driver);
    state
}

/// A state bag connected to `driver` holding a freshly created, powered-off VM.
///
/// # Panics
///
/// Panics if the simulated endpoint refuses to create the VM.
pub async fn state_with_vm(driver: Arc<SimulatedDriver>) -> StateBag {
    #[allow(clippy::expect_used)]
    let vm = driver
        .create_vm(&vm_spec("fixture-vm"))
        .await
        .expect("fixture VM creation");
    let mut state = state_with_driver(driver);
    state.set_vm(vm);
    state
}
