//! Cooperative cancellation for build runs.
//!
//! The operator (usually via Ctrl-C) raises a [`CancellationToken`]. The
//! runner checks it between steps; steps check it at their own wait points.
//! Nothing here can interrupt a call already handed to the hypervisor.

mod token;

pub use token::{CancelCallback, CancellationToken};
