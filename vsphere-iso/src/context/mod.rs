//! Per-run state.
//!
//! This module provides:
//! - The run identity used to correlate logs and events
//! - The typed state bag steps read from and write to

mod identity;
mod state;

pub use identity::RunIdentity;
pub use state::{StateBag, TerminalState};
