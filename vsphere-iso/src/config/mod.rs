//! Build definition decoding and validation.
//!
//! A build definition is a flat JSON object. Each section below reads its
//! own keys from it, so the same document carries the connection, creation,
//! hardware and communicator settings side by side.

mod communicator;
mod disk;
mod vsphere;

pub use communicator::{CommunicatorConfig, CommunicatorType, ProvisionerConfig};
pub use disk::DiskSize;
pub use vsphere::{ConnectConfig, CreateConfig, HardwareConfig};

use crate::errors::{BuildError, BuildResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration of one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// vCenter connection.
    #[serde(flatten)]
    pub connect: ConnectConfig,
    /// VM creation request.
    #[serde(flatten)]
    pub create: CreateConfig,
    /// Post-creation hardware customisation.
    #[serde(flatten)]
    pub hardware: HardwareConfig,
    /// Guest communicator.
    #[serde(flatten)]
    pub comm: CommunicatorConfig,
    /// Guest provisioners, run in order.
    #[serde(default)]
    pub provisioners: Vec<ProvisionerConfig>,
    /// Take a snapshot once the guest is shut down.
    #[serde(default)]
    pub create_snapshot: bool,
    /// Name given to that snapshot.
    #[serde(default = "default_snapshot_name")]
    pub snapshot_name: String,
    /// Mark the VM as a template at the end of the build.
    #[serde(default)]
    pub convert_to_template: bool,
    /// Maximum time to wait for a graceful guest shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    /// Interval between power-state polls during shutdown.
    #[serde(default = "default_shutdown_poll_interval")]
    pub shutdown_poll_interval_ms: u64,
}

fn default_snapshot_name() -> String {
    "Created by Packer".to_string()
}

fn default_shutdown_timeout() -> u64 {
    300
}

fn default_shutdown_poll_interval() -> u64 {
    1000
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            connect: ConnectConfig::default(),
            create: CreateConfig::default(),
            hardware: HardwareConfig::default(),
            comm: CommunicatorConfig::default(),
            provisioners: Vec::new(),
            create_snapshot: false,
            snapshot_name: default_snapshot_name(),
            convert_to_template: false,
            shutdown_timeout_seconds: default_shutdown_timeout(),
            shutdown_poll_interval_ms: default_shutdown_poll_interval(),
        }
    }
}

impl BuildConfig {
    /// Decodes a build definition from a JSON string.
    pub fn from_json_str(raw: &str) -> BuildResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads and decodes a build definition file.
    pub fn from_file(path: impl AsRef<Path>) -> BuildResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            BuildError::Serialization(format!("{}: {e}", path.display()))
        })
    }

    /// Validates every section and reports all problems together.
    pub fn prepare(&self) -> Result<(), ConfigError> {
        let mut errs = ConfigError::new();
        errs.extend(self.connect.prepare());
        errs.extend(self.create.prepare());
        errs.extend(self.hardware.prepare());
        errs.extend(self.comm.prepare());
        for provisioner in &self.provisioners {
            errs.extend(provisioner.prepare());
        }
        if self.create_snapshot && self.snapshot_name.trim().is_empty() {
            errs.push("'snapshot_name' must not be empty when 'create_snapshot' is set");
        }
        if self.shutdown_timeout_seconds == 0 {
            errs.push("'shutdown_timeout_seconds' must be greater than zero");
        }
        if self.shutdown_poll_interval_ms == 0 {
            errs.push("'shutdown_poll_interval_ms' must be greater than zero");
        }
        errs.into_result()
    }

    /// Gets the shutdown deadline as a Duration.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Gets the shutdown poll interval as a Duration.
    #[must_use]
    pub fn shutdown_poll_interval(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DEFINITION: &str = r#"{
        "vcenter_server": "vc.lab.local",
        "username": "builder@vsphere.local",
        "password": "secret",
        "insecure_connection": true,
        "datacenter": "dc1",
        "vm_name": "ubuntu-base",
        "disk_size": "40G",
        "iso": "isos/ubuntu.iso",
        "iso_datastore": "ds-iso",
        "datastore": "ds-vm",
        "network": "VM Network",
        "CPUs": 2,
        "RAM": 4096,
        "ssh_username": "ubuntu",
        "provisioners": [{"type": "shell-local", "inline": ["echo ok"]}],
        "create_snapshot": true
    }"#;

    #[test]
    fn test_decode_flat_definition() {
        let cfg = BuildConfig::from_json_str(DEFINITION).unwrap();

        assert_eq!(cfg.connect.vcenter_server, "vc.lab.local");
        assert!(cfg.connect.insecure_connection);
        assert_eq!(cfg.create.vm_name, "ubuntu-base");
        assert_eq!(cfg.create.iso_file, "isos/ubuntu.iso");
        assert_eq!(cfg.hardware.cpus, 2);
        assert_eq!(cfg.comm.ssh_port, 22);
        assert_eq!(cfg.snapshot_name, "Created by Packer");
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(300));
        assert!(cfg.prepare().is_ok());
    }

    #[test]
    fn test_prepare_collects_all_errors() {
        let err = BuildConfig::default().prepare().unwrap_err();
        // connect (3) + create (2) + communicator (1)
        assert_eq!(err.errors.len(), 6);
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let err = BuildConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, BuildError::Serialization(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.json");
        std::fs::write(&path, DEFINITION).unwrap();

        let cfg = BuildConfig::from_file(&path).unwrap();
        assert_eq!(cfg.create.disk().unwrap(), DiskSize::from_gib(40));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = BuildConfig::from_file("/nonexistent/build.json").unwrap_err();
        assert!(matches!(err, BuildError::Io(_)));
    }
}
