//! Step execution engine.
//!
//! This module provides:
//! - The [`StepRunner`] state machine
//! - The [`RunReport`] it returns

#[cfg(test)]
mod integration_tests;
mod report;
mod step_runner;

pub use report::{CleanupFailure, RunReport};
pub use step_runner::StepRunner;
