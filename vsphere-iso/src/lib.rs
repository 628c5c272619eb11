//! # vsphere-iso
//!
//! Builds a vSphere virtual machine from an ISO by running an ordered list
//! of provisioning steps: connect, create, configure hardware, boot, wait
//! for the guest, provision, shut down, snapshot and convert to template.
//!
//! The heart of the crate is the [`runner::StepRunner`]:
//!
//! - **Ordered execution**: each step runs once, left to right
//! - **Compensation**: on halt or cancellation, steps that completed are
//!   cleaned up in reverse order
//! - **Single terminal cause**: the first error or cancellation is the one
//!   reported, whatever happens during cleanup
//! - **Cooperative cancellation**: observed between steps and at every
//!   wait point inside a step
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vsphere_iso::prelude::*;
//!
//! let config = BuildConfig::from_file("build.json")?;
//! let builder = Builder::prepare(config)?;
//! let artifact = builder
//!     .run(Arc::new(ConsoleUi::new("vsphere-iso")), connector, provisioners)
//!     .await?;
//! println!("{artifact}");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod builder;
pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod driver;
pub mod errors;
pub mod events;
pub mod observability;
pub mod provision;
pub mod runner;
pub mod steps;
pub mod testing;
pub mod ui;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::Builder;
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::BuildConfig;
    pub use crate::context::{RunIdentity, StateBag, TerminalState};
    pub use crate::core::{Artifact, ArtifactSummary, BuildEvent, RunOutcome, StepAction};
    pub use crate::driver::{Connector, Driver, SimulatedConnector, SimulatedDriver};
    pub use crate::errors::{BuildError, BuildResult, ConfigError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::provision::{Provisioner, ShellLocalProvisioner};
    pub use crate::runner::{RunReport, StepRunner};
    pub use crate::steps::Step;
    pub use crate::ui::{ConsoleUi, LoggingUi, Ui};
    pub use std::sync::Arc;
}
