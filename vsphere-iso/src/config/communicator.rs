//! Guest communicator and provisioner sections.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the builder reaches the guest once it has booted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicatorType {
    /// Wait for SSH, then provision.
    #[default]
    Ssh,
    /// Skip booting and provisioning entirely.
    None,
}

/// Communicator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicatorConfig {
    /// Communicator type.
    #[serde(default, rename = "communicator")]
    pub comm_type: CommunicatorType,
    /// SSH port on the guest.
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    /// SSH user.
    #[serde(default)]
    pub ssh_username: String,
    /// SSH password.
    #[serde(default)]
    pub ssh_password: String,
    /// How long to wait for the port to accept connections.
    #[serde(default = "default_ssh_timeout")]
    pub ssh_timeout_seconds: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_timeout() -> u64 {
    300
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        Self {
            comm_type: CommunicatorType::default(),
            ssh_port: default_ssh_port(),
            ssh_username: String::new(),
            ssh_password: String::new(),
            ssh_timeout_seconds: default_ssh_timeout(),
        }
    }
}

impl CommunicatorConfig {
    /// Validates the section, returning every problem found.
    #[must_use]
    pub fn prepare(&self) -> Vec<String> {
        let mut errs = Vec::new();
        if self.comm_type == CommunicatorType::Ssh {
            if self.ssh_username.is_empty() {
                errs.push("An ssh_username must be specified".to_string());
            }
            if self.ssh_port == 0 {
                errs.push("ssh_port must be greater than zero".to_string());
            }
        }
        errs
    }

    /// Returns true when the guest is booted and provisioned.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.comm_type != CommunicatorType::None
    }

    /// Gets the connect timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_timeout_seconds)
    }
}

/// A guest provisioner declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProvisionerConfig {
    /// Runs commands on the build host against the guest address.
    ShellLocal {
        /// Commands, each run through `sh -c`.
        inline: Vec<String>,
        /// Extra `KEY=VALUE` pairs for the command environment.
        #[serde(default)]
        environment_vars: Vec<String>,
    },
}

impl ProvisionerConfig {
    /// Validates the declaration, returning every problem found.
    #[must_use]
    pub fn prepare(&self) -> Vec<String> {
        let mut errs = Vec::new();
        match self {
            Self::ShellLocal {
                inline,
                environment_vars,
            } => {
                if inline.is_empty() {
                    errs.push("shell-local: 'inline' must contain at least one command".to_string());
                }
                for var in environment_vars {
                    if !var.contains('=') || var.starts_with('=') {
                        errs.push(format!(
                            "shell-local: environment variable '{var}' must be in KEY=VALUE form"
                        ));
                    }
                }
            }
        }
        errs
    }
}
