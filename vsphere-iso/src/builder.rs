//! Assembles the pipeline from a build definition and runs it once.

use crate::cancellation::CancellationToken;
use crate::config::BuildConfig;
use crate::context::{RunIdentity, StateBag};
use crate::core::Artifact;
use crate::driver::Connector;
use crate::errors::{BuildError, BuildResult, ConfigError};
use crate::events::{EventSink, NoOpEventSink};
use crate::provision::Provisioner;
use crate::runner::{RunReport, StepRunner};
use crate::steps::{
    Connect, ConfigureHardware, ConvertToTemplate, CreateSnapshot, CreateVm, PowerOnAndWaitForAddress,
    ProvisionGuest, ShutdownGuest, Step, WaitForCommunicator,
};
use crate::ui::Ui;
use std::sync::Arc;
use tracing::info;

/// A validated build, ready to run.
pub struct Builder {
    config: BuildConfig,
    cancel: Arc<CancellationToken>,
    events: Arc<dyn EventSink>,
}

impl Builder {
    /// Validates `config` and returns a builder for it.
    pub fn prepare(config: BuildConfig) -> Result<Self, ConfigError> {
        config.prepare()?;
        Ok(Self {
            config,
            cancel: Arc::new(CancellationToken::new()),
            events: Arc::new(NoOpEventSink),
        })
    }

    /// Sets the event sink handed to the runner.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the build definition.
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Returns the token shared with the running build.
    #[must_use]
    pub fn cancellation(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancel)
    }

    /// Requests cancellation of the running build.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel.cancel(reason);
    }

    /// Builds the ordered step list.
    ///
    /// With the `none` communicator the VM is never booted, so power-on,
    /// the communicator wait, provisioning and shutdown are left out.
    #[must_use]
    pub fn steps(
        &self,
        connector: Arc<dyn Connector>,
        provisioners: Vec<Arc<dyn Provisioner>>,
    ) -> Vec<Box<dyn Step>> {
        let cfg = &self.config;
        let mut steps: Vec<Box<dyn Step>> = vec![
            Box::new(Connect::new(cfg.connect.clone(), connector)),
            Box::new(CreateVm::new(cfg.create.clone())),
            Box::new(ConfigureHardware::new(cfg.hardware)),
        ];
        if cfg.comm.is_enabled() {
            steps.push(Box::new(PowerOnAndWaitForAddress::new()));
            steps.push(Box::new(WaitForCommunicator::new(cfg.comm.ssh_port, cfg.comm.timeout())));
            steps.push(Box::new(ProvisionGuest::new(cfg.comm.clone(), provisioners)));
            steps.push(Box::new(ShutdownGuest::new(
                cfg.shutdown_timeout(),
                cfg.shutdown_poll_interval(),
            )));
        }
        steps.push(Box::new(CreateSnapshot::new(cfg.create_snapshot, cfg.snapshot_name.clone())));
        steps.push(Box::new(ConvertToTemplate::new(cfg.convert_to_template)));
        steps
    }

    /// Runs the build and returns its artifact.
    pub async fn run(
        &self,
        ui: Arc<dyn Ui>,
        connector: Arc<dyn Connector>,
        provisioners: Vec<Arc<dyn Provisioner>>,
    ) -> BuildResult<Artifact> {
        self.run_with_report(ui, connector, provisioners).await.0
    }

    /// Runs the build, returning the artifact together with the run report.
    pub async fn run_with_report(
        &self,
        ui: Arc<dyn Ui>,
        connector: Arc<dyn Connector>,
        provisioners: Vec<Arc<dyn Provisioner>>,
    ) -> (BuildResult<Artifact>, RunReport) {
        let runner = StepRunner::new(self.steps(connector, provisioners))
            .with_event_sink(Arc::clone(&self.events));
        let identity = RunIdentity::new().with_build_name(&self.config.create.vm_name);
        info!(run_id = %identity.run_id, vm = %self.config.create.vm_name, steps = ?runner.step_names(), "starting build");

        let mut state = StateBag::new(ui)
            .with_identity(identity)
            .with_cancellation(Arc::clone(&self.cancel));
        let report = runner.run(&mut state).await;

        (Self::conclude(&mut state), report)
    }

    /// Maps the final state onto the build result.
    fn conclude(state: &mut StateBag) -> BuildResult<Artifact> {
        if let Some(terminal) = state.take_terminal() {
            let err = terminal.into_error();
            if !matches!(err, BuildError::Cancelled(_) | BuildError::Halted) {
                state.ui().error(&format!("Build failed: {err}"));
            }
            return Err(err);
        }
        Ok(Artifact::new(state.vm()?, state.driver()?))
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("vm_name", &self.config.create.vm_name)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
