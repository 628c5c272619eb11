//! Connection, VM creation and hardware sections of a build definition.

use super::disk::DiskSize;
use serde::{Deserialize, Serialize};

/// Details for the vCenter connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// vCenter host name (without scheme or `/sdk`).
    #[serde(default)]
    pub vcenter_server: String,
    /// Login user.
    #[serde(default)]
    pub username: String,
    /// Login password.
    #[serde(default)]
    pub password: String,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure_connection: bool,
    /// Datacenter to operate in; empty selects the endpoint's default.
    #[serde(default)]
    pub datacenter: String,
}

impl ConnectConfig {
    /// Validates the section, returning every problem found.
    #[must_use]
    pub fn prepare(&self) -> Vec<String> {
        let mut errs = Vec::new();
        if self.vcenter_server.is_empty() {
            errs.push("vCenter hostname is required".to_string());
        }
        if self.username.is_empty() {
            errs.push("Username is required".to_string());
        }
        if self.password.is_empty() {
            errs.push("Password is required".to_string());
        }
        errs
    }

    /// Returns the SDK endpoint URL for this server.
    #[must_use]
    pub fn sdk_url(&self) -> String {
        format!("https://{}/sdk", self.vcenter_server)
    }
}

/// Details for the VM creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConfig {
    /// Name of the VM to create.
    #[serde(default)]
    pub vm_name: String,
    /// Inventory folder below the datacenter's `vm` folder.
    #[serde(default)]
    pub folder: String,
    /// Guest OS identifier.
    #[serde(default = "default_guest_os")]
    pub guest_os_type: String,
    /// Initial virtual CPU count.
    #[serde(default = "default_cpu")]
    pub cpu: i32,
    /// Initial memory in MB.
    #[serde(default = "default_ram")]
    pub ram: i64,
    /// Free-form VM notes.
    #[serde(default)]
    pub annotation: String,
    /// Virtual hardware version (e.g. `vmx-13`); empty uses the host default.
    #[serde(default)]
    pub hardware_version: String,
    /// Disk capacity, e.g. `40` or `40G`.
    #[serde(default)]
    pub disk_size: String,
    /// ISO path inside `iso_datastore`.
    #[serde(default, rename = "iso")]
    pub iso_file: String,
    /// Datastore holding the ISO.
    #[serde(default)]
    pub iso_datastore: String,
    /// ESXi host to place the VM on.
    #[serde(default)]
    pub host: String,
    /// Resource pool; empty selects the default pool.
    #[serde(default)]
    pub resource_pool: String,
    /// Cluster to place the VM in.
    #[serde(default)]
    pub cluster: String,
    /// Datastore for the VM files.
    #[serde(default)]
    pub datastore: String,
    /// Network to attach the adapter to.
    #[serde(default)]
    pub network: String,
    /// Adapter type.
    #[serde(default = "default_network_adapter")]
    pub network_adapter: String,
    /// Static MAC address; empty lets the endpoint generate one.
    #[serde(default)]
    pub network_mac_address: String,
}

fn default_guest_os() -> String {
    "otherGuest".to_string()
}

fn default_cpu() -> i32 {
    1
}

fn default_ram() -> i64 {
    1024
}

fn default_network_adapter() -> String {
    "vmxnet3".to_string()
}

impl Default for CreateConfig {
    fn default() -> Self {
        Self {
            vm_name: String::new(),
            folder: String::new(),
            guest_os_type: default_guest_os(),
            cpu: default_cpu(),
            ram: default_ram(),
            annotation: String::new(),
            hardware_version: String::new(),
            disk_size: String::new(),
            iso_file: String::new(),
            iso_datastore: String::new(),
            host: String::new(),
            resource_pool: String::new(),
            cluster: String::new(),
            datastore: String::new(),
            network: String::new(),
            network_adapter: default_network_adapter(),
            network_mac_address: String::new(),
        }
    }
}

impl CreateConfig {
    /// Validates the section, returning every problem found.
    #[must_use]
    pub fn prepare(&self) -> Vec<String> {
        let mut errs = Vec::new();
        if self.vm_name.is_empty() {
            errs.push("Target VM name is required".to_string());
        }
        if self.disk_size.is_empty() {
            errs.push("'disk_size' is required".to_string());
        } else if let Err(e) = DiskSize::parse(&self.disk_size) {
            errs.push(e);
        }
        if self.cpu < 1 {
            errs.push("'cpu' must be at least 1".to_string());
        }
        if self.ram < 1 {
            errs.push("'ram' must be at least 1 MB".to_string());
        }
        if !self.iso_file.is_empty() && self.iso_datastore.is_empty() {
            errs.push("'iso_datastore' is required when 'iso' is set".to_string());
        }
        errs
    }

    /// Returns the parsed disk size.
    pub fn disk(&self) -> Result<DiskSize, String> {
        DiskSize::parse(&self.disk_size)
    }
}

/// Post-creation hardware sizing and reservations.
///
/// An all-default section means "leave the VM as created".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Virtual CPU count.
    #[serde(default, rename = "CPUs")]
    pub cpus: i32,
    /// CPU reservation in MHz.
    #[serde(default, rename = "CPU_reservation")]
    pub cpu_reservation: i64,
    /// CPU limit in MHz.
    #[serde(default, rename = "CPU_limit")]
    pub cpu_limit: i64,
    /// Memory in MB.
    #[serde(default, rename = "RAM")]
    pub ram: i64,
    /// Memory reservation in MB.
    #[serde(default, rename = "RAM_reservation")]
    pub ram_reservation: i64,
    /// Reserve all guest memory.
    #[serde(default, rename = "RAM_reserve_all")]
    pub ram_reserve_all: bool,
}

impl HardwareConfig {
    /// Validates the section, returning every problem found.
    #[must_use]
    pub fn prepare(&self) -> Vec<String> {
        let mut errs = Vec::new();
        if self.ram_reservation > 0 && self.ram_reserve_all {
            errs.push("'RAM_reservation' and 'RAM_reserve_all' cannot be used together".to_string());
        }
        if self.cpus < 0 || self.ram < 0 || self.cpu_reservation < 0 || self.ram_reservation < 0 {
            errs.push("hardware values must not be negative".to_string());
        }
        errs
    }

    /// Returns true if nothing was customised.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
