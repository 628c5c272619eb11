//! Core domain model types.
//!
//! This module contains the fundamental types shared by the runner and the
//! steps:
//! - The per-step outcome ([`StepAction`]) and the run-level [`RunOutcome`]
//! - The build [`Artifact`]
//! - Lifecycle [`BuildEvent`]s

mod artifact;
mod event;
mod status;

pub use artifact::{Artifact, ArtifactSummary, BUILDER_ID};
pub use event::BuildEvent;
pub use status::{RunOutcome, StepAction};
