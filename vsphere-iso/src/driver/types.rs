//! Value types exchanged with the hypervisor driver.

use crate::config::{CreateConfig, DiskSize, HardwareConfig};
use crate::errors::{BuildResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a VM on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VmRef {
    /// Managed object id, e.g. `vm-1042`.
    pub id: String,
    /// Inventory name.
    pub name: String,
}

impl VmRef {
    /// Creates a new VM reference.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for VmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// VM power state as reported by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    /// Running.
    PoweredOn,
    /// Stopped.
    PoweredOff,
    /// Suspended to disk.
    Suspended,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoweredOn => write!(f, "poweredOn"),
            Self::PoweredOff => write!(f, "poweredOff"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

/// Everything the endpoint needs to create the VM and its devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSpec {
    /// Inventory name.
    pub name: String,
    /// Inventory folder path, relative to the datacenter's `vm` folder.
    pub folder: String,
    /// Guest OS identifier.
    pub guest_os: String,
    /// Virtual CPUs.
    pub cpus: i32,
    /// Memory in MB.
    pub memory_mb: i64,
    /// Notes.
    pub annotation: String,
    /// Hardware version; `None` uses the host default.
    pub hardware_version: Option<String>,
    /// Thin-provisioned system disk on a SCSI controller.
    pub disk: DiskSize,
    /// ISO mounted on an IDE CD-ROM, as a datastore path (`[ds] path`).
    pub iso: Option<String>,
    /// Datastore for the VM files.
    pub datastore: String,
    /// Resource pool; `None` selects the default pool.
    pub resource_pool: Option<String>,
    /// Target host.
    pub host: Option<String>,
    /// Target cluster.
    pub cluster: Option<String>,
    /// Network for the single adapter.
    pub network: String,
    /// Adapter type.
    pub network_adapter: String,
    /// Static MAC address.
    pub mac_address: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl VmSpec {
    /// Builds a creation spec from the create section of a build definition.
    pub fn from_config(config: &CreateConfig) -> BuildResult<Self> {
        let disk = config.disk().map_err(|e| {
            let mut errs = ConfigError::new();
            errs.push(e);
            errs
        })?;

        let iso = non_empty(&config.iso_file)
            .map(|file| format!("[{}] {}", config.iso_datastore, file));

        Ok(Self {
            name: config.vm_name.clone(),
            folder: config.folder.clone(),
            guest_os: config.guest_os_type.clone(),
            cpus: config.cpu,
            memory_mb: config.ram,
            annotation: config.annotation.clone(),
            hardware_version: non_empty(&config.hardware_version),
            disk,
            iso,
            datastore: config.datastore.clone(),
            resource_pool: non_empty(&config.resource_pool),
            host: non_empty(&config.host),
            cluster: non_empty(&config.cluster),
            network: config.network.clone(),
            network_adapter: config.network_adapter.clone(),
            mac_address: non_empty(&config.network_mac_address),
        })
    }
}

/// A reconfiguration request. `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSpec {
    /// Virtual CPUs.
    pub cpus: Option<i32>,
    /// CPU reservation in MHz.
    pub cpu_reservation: i64,
    /// CPU limit in MHz.
    pub cpu_limit: Option<i64>,
    /// Memory in MB.
    pub memory_mb: Option<i64>,
    /// Memory reservation in MB.
    pub memory_reservation: i64,
    /// Lock the reservation to the configured memory size.
    pub memory_reserve_all: bool,
}

impl From<&HardwareConfig> for HardwareSpec {
    fn from(config: &HardwareConfig) -> Self {
        Self {
            cpus: (config.cpus > 0).then_some(config.cpus),
            cpu_reservation: config.cpu_reservation,
            cpu_limit: (config.cpu_limit > 0).then_some(config.cpu_limit),
            memory_mb: (config.ram > 0).then_some(config.ram),
            memory_reservation: config.ram_reservation,
            memory_reserve_all: config.ram_reserve_all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BuildError;
    use pretty_assertions::assert_eq;

    fn create_config() -> CreateConfig {
        CreateConfig {
            vm_name: "base".into(),
            disk_size: "32".into(),
            iso_file: "isos/alpine.iso".into(),
            iso_datastore: "iso-store".into(),
            datastore: "vm-store".into(),
            network: "VM Network".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_vm_spec_from_config() {
        let spec = VmSpec::from_config(&create_config()).unwrap();

        assert_eq!(spec.name, "base");
        assert_eq!(spec.disk, DiskSize::from_gib(32));
        assert_eq!(spec.iso.as_deref(), Some("[iso-store] isos/alpine.iso"));
        assert_eq!(spec.resource_pool, None);
        assert_eq!(spec.hardware_version, None);
    }

    #[test]
    fn test_vm_spec_rejects_bad_disk() {
        let cfg = CreateConfig {
            disk_size: "lots".into(),
            ..create_config()
        };
        assert!(matches!(VmSpec::from_config(&cfg), Err(BuildError::Config(_))));
    }

    #[test]
    fn test_hardware_spec_zero_means_unchanged() {
        let spec = HardwareSpec::from(&HardwareConfig {
            ram: 2048,
            ..Default::default()
        });
        assert_eq!(
            spec,
            HardwareSpec {
                memory_mb: Some(2048),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_power_state_wire_names() {
        assert_eq!(serde_json::to_string(&PowerState::PoweredOff).unwrap(), r#""poweredOff""#);
        assert_eq!(PowerState::PoweredOn.to_string(), "poweredOn");
    }
}
