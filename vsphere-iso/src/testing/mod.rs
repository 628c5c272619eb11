//! Testing utilities for build pipelines.
//!
//! This module provides:
//! - Scripted steps and a shared call log
//! - Fixture configurations and state bags
//! - Assertions over run reports

mod assertions;
pub mod fixtures;
mod mocks;

pub use assertions::{assert_cleaned, assert_compensated_in_reverse, assert_no_cleanup, assert_outcome};
pub use mocks::{CallLog, ScriptedStep};
