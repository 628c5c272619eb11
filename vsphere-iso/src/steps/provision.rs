//! Hands the booted guest to the provisioners.

use super::Step;
use crate::config::CommunicatorConfig;
use crate::context::StateBag;
use crate::core::StepAction;
use crate::errors::BuildError;
use crate::provision::{GuestTarget, ProvisionContext, Provisioner};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Runs each provisioner in order against the guest at `ip`.
///
/// Whatever a provisioner changed inside the guest is its own business;
/// this step has no cleanup.
pub struct ProvisionGuest {
    comm: CommunicatorConfig,
    provisioners: Vec<Arc<dyn Provisioner>>,
}

impl ProvisionGuest {
    /// Creates the step.
    #[must_use]
    pub fn new(comm: CommunicatorConfig, provisioners: Vec<Arc<dyn Provisioner>>) -> Self {
        Self { comm, provisioners }
    }
}

impl fmt::Debug for ProvisionGuest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.provisioners.iter().map(|p| p.name()).collect();
        f.debug_struct("ProvisionGuest")
            .field("provisioners", &names)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Step for ProvisionGuest {
    fn name(&self) -> &str {
        "provision"
    }

    async fn run(&self, state: &mut StateBag) -> StepAction {
        let address = match state.ip() {
            Ok(ip) => ip.to_string(),
            Err(err) => return state.fail(err),
        };
        let ctx = ProvisionContext {
            target: GuestTarget {
                address,
                port: self.comm.ssh_port,
                username: self.comm.ssh_username.clone(),
                password: self.comm.ssh_password.clone(),
            },
            ui: Arc::clone(state.ui()),
            cancel: Arc::clone(state.cancellation()),
        };

        for provisioner in &self.provisioners {
            if ctx.cancel.is_cancelled() {
                return state.cancel(ctx.cancel.reason_or_default());
            }
            state
                .ui()
                .say(&format!("Provisioning with {}...", provisioner.name()));
            info!(provisioner = provisioner.name(), target = %ctx.target, "provisioning guest");
            if let Err(err) = provisioner.provision(ctx.clone()).await {
                let err = match err {
                    e @ (BuildError::Cancelled(_) | BuildError::Provision(_)) => e,
                    other => BuildError::Provision(format!("{}: {other}", provisioner.name())),
                };
                return state.abort(err);
            }
        }
        StepAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::MockProvisioner;
    use crate::testing::fixtures;
    use mockall::predicate::function;

    fn comm() -> CommunicatorConfig {
        CommunicatorConfig {
            ssh_username: "root".into(),
            ..Default::default()
        }
    }

    fn state() -> StateBag {
        let mut state = fixtures::state_bag();
        state.set_ip("10.0.4.2");
        state
    }

    #[tokio::test]
    async fn test_provisioner_receives_target() {
        let mut mock = MockProvisioner::new();
        mock.expect_name().return_const("mock");
        mock.expect_provision()
            .with(function(|ctx: &ProvisionContext| {
                ctx.target.address == "10.0.4.2" && ctx.target.port == 22 && ctx.target.username == "root"
            }))
            .times(1)
            .returning(|_| Ok(()));

        let step = ProvisionGuest::new(comm(), vec![Arc::new(mock)]);
        let mut state = state();
        assert_eq!(step.run(&mut state).await, StepAction::Continue);
    }

    #[tokio::test]
    async fn test_failure_halts_and_stops_later_provisioners() {
        let mut failing = MockProvisioner::new();
        failing.expect_name().return_const("first");
        failing
            .expect_provision()
            .times(1)
            .returning(|_| Err(BuildError::Provision("exit 1".into())));
        let mut never = MockProvisioner::new();
        never.expect_name().return_const("second");
        never.expect_provision().never();

        let step = ProvisionGuest::new(comm(), vec![Arc::new(failing), Arc::new(never)]);
        let mut state = state();
        assert_eq!(step.run(&mut state).await, StepAction::Halt);
        assert!(matches!(state.error(), Some(BuildError::Provision(_))));
    }

    #[tokio::test]
    async fn test_cancelled_provisioner_cancels() {
        let mut mock = MockProvisioner::new();
        mock.expect_name().return_const("slow");
        mock.expect_provision()
            .returning(|_| Err(BuildError::Cancelled("interrupt".into())));

        let step = ProvisionGuest::new(comm(), vec![Arc::new(mock)]);
        let mut state = state();
        assert_eq!(step.run(&mut state).await, StepAction::Cancel);
        assert!(state.was_cancelled());
    }

    #[tokio::test]
    async fn test_no_provisioners_continues() {
        let step = ProvisionGuest::new(comm(), Vec::new());
        let mut state = state();
        assert_eq!(step.run(&mut state).await, StepAction::Continue);
    }
}
