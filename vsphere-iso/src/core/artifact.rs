//! The result of a successful build.

use crate::driver::{Driver, VmRef};
use crate::errors::BuildResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of the builder that produced an artifact.
pub const BUILDER_ID: &str = "martezr.vsphere-iso";

/// A provisioned VM left behind by a successful build.
///
/// Holds the driver session so the caller can tear the VM down later.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// VM inventory name.
    pub name: String,
    /// Handle to the VM on the endpoint.
    pub vm: VmRef,
    /// Builder identifier.
    pub builder_id: &'static str,
    /// When the build finished.
    pub created_at: DateTime<Utc>,
    driver: Arc<dyn Driver>,
}

impl Artifact {
    /// Creates an artifact for the given VM.
    #[must_use]
    pub fn new(vm: VmRef, driver: Arc<dyn Driver>) -> Self {
        Self {
            name: vm.name.clone(),
            vm,
            builder_id: BUILDER_ID,
            created_at: Utc::now(),
            driver,
        }
    }

    /// Artifact identifier; the VM name.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.name
    }

    /// Local files produced by the build. A vSphere VM has none.
    #[must_use]
    pub fn files(&self) -> Vec<String> {
        Vec::new()
    }

    /// Destroys the VM on the endpoint.
    pub async fn destroy(&self) -> BuildResult<()> {
        self.driver.destroy_vm(&self.vm).await
    }

    /// Serialisable view of the artifact.
    #[must_use]
    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            id: self.id().to_string(),
            builder_id: self.builder_id.to_string(),
            vm_id: self.vm.id.clone(),
            files: self.files(),
            created_at: self.created_at,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Artifact details for machine-readable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    /// Artifact identifier.
    pub id: String,
    /// Builder identifier.
    pub builder_id: String,
    /// Managed object id of the VM.
    pub vm_id: String,
    /// Local files; always empty.
    pub files: Vec<String>,
    /// When the build finished.
    pub created_at: DateTime<Utc>,
}
