//! Guest-provisioning collaborators.
//!
//! A [`Provisioner`] is handed a reachable guest and runs whatever
//! configuration it was declared with. Failures surface as a halt of the
//! provisioning step.

mod shell_local;

pub use shell_local::ShellLocalProvisioner;

use crate::cancellation::CancellationToken;
use crate::config::ProvisionerConfig;
use crate::errors::BuildResult;
use crate::ui::Ui;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Where and as whom to reach the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestTarget {
    /// Guest address.
    pub address: String,
    /// Communicator port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl fmt::Display for GuestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.address, self.port)
    }
}

/// Everything a provisioner gets for one invocation.
#[derive(Clone)]
pub struct ProvisionContext {
    /// The guest to configure.
    pub target: GuestTarget,
    /// Output sink for progress.
    pub ui: Arc<dyn Ui>,
    /// The run's cancellation token.
    pub cancel: Arc<CancellationToken>,
}

impl fmt::Debug for ProvisionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionContext")
            .field("target", &self.target)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Configures a booted guest.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Short name for logs and output.
    fn name(&self) -> &'static str;

    /// Runs the provisioner against the guest.
    ///
    /// Returns `BuildError::Cancelled` if the token fires while running.
    async fn provision(&self, ctx: ProvisionContext) -> BuildResult<()>;
}

/// Instantiates the provisioners declared in a build definition.
#[must_use]
pub fn from_configs(configs: &[ProvisionerConfig]) -> Vec<Arc<dyn Provisioner>> {
    configs
        .iter()
        .map(|config| match config {
            ProvisionerConfig::ShellLocal {
                inline,
                environment_vars,
            } => Arc::new(ShellLocalProvisioner::new(inline.clone()).with_env(environment_vars))
                as Arc<dyn Provisioner>,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_configs() {
        let provisioners = from_configs(&[ProvisionerConfig::ShellLocal {
            inline: vec!["true".into()],
            environment_vars: vec!["A=1".into()],
        }]);
        assert_eq!(provisioners.len(), 1);
        assert_eq!(provisioners[0].name(), "shell-local");
    }

    #[test]
    fn test_target_display() {
        let target = GuestTarget {
            address: "10.0.0.9".into(),
            port: 22,
            username: "root".into(),
            password: String::new(),
        };
        assert_eq!(target.to_string(), "root@10.0.0.9:22");
    }
}
