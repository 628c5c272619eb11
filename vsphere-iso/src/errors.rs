//! Error types for the vsphere-iso builder.
//!
//! Every failure a build can surface flows through [`BuildError`]. Steps
//! record exactly one of these in the build state before halting; the
//! runner never replaces a recorded error with a later one.

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type BuildResult<T> = Result<T, BuildError>;

/// The main error type for build operations.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build configuration failed validation.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A step ran before the step that provides one of its inputs.
    #[error("missing precondition: `{0}` is not present in the build state")]
    MissingState(&'static str),

    /// A call against the hypervisor endpoint failed.
    #[error("{operation} failed: {message}")]
    Driver {
        /// The driver operation that failed (e.g. "create_vm").
        operation: &'static str,
        /// The error reported by the endpoint.
        message: String,
    },

    /// A bounded wait exceeded its deadline.
    #[error("{0}")]
    Timeout(String),

    /// The guest-provisioning collaborator failed.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// The build was cancelled by the operator.
    #[error("Build was cancelled: {0}")]
    Cancelled(String),

    /// A step halted the build without recording an error.
    #[error("Build was halted.")]
    Halted,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BuildError {
    /// Creates a driver error for the given operation.
    pub fn driver(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Driver {
            operation,
            message: message.into(),
        }
    }

    /// Returns true if the error represents operator cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Maps the error onto a process exit status.
    ///
    /// Cancellation and configuration problems get their own codes so that
    /// wrappers can tell them apart from a failed build.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Cancelled(_) => 130,
            _ => 1,
        }
    }
}

impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Every problem found while preparing a build configuration.
///
/// Validation does not stop at the first problem; all messages are
/// collected so the operator can fix them in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
pub struct ConfigError {
    /// Individual validation messages, in discovery order.
    pub errors: Vec<String>,
}

impl ConfigError {
    /// Creates an empty error collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validation message.
    pub fn push(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Appends all messages from another collection.
    pub fn extend(&mut self, other: impl IntoIterator<Item = String>) {
        self.errors.extend(other);
    }

    /// Returns true if no problems were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts the collection into a result: `Ok` when empty.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred:", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n* {err}")?;
        }
        Ok(())
    }
}
