//! Execution environment management.
//!
//! Each job instance owns an isolated workspace for its lifetime. The
//! provisioner seam is a trait so hosted environments can plug in; the local
//! runner uses a per-instance directory on the host.

use crosscheck_core::Result;
use crosscheck_core::run::JobInstance;
use std::path::{Path, PathBuf};
use tracing::info;

/// Trait for execution environments.
#[async_trait::async_trait]
pub trait Environment: Send + Sync {
    /// Prepare the execution environment.
    async fn prepare(&self) -> Result<()>;

    /// Get the working directory.
    fn working_dir(&self) -> &Path;

    /// Cleanup the execution environment.
    async fn cleanup(&self) -> Result<()>;
}

/// Host environment: a scratch directory per job instance.
pub struct HostEnvironment {
    workspace: PathBuf,
}

impl HostEnvironment {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    /// Workspace for one instance under the runner's root.
    pub fn for_instance(root: &Path, instance: &JobInstance) -> Self {
        Self::new(root.join(instance.id.to_string()))
    }
}

#[async_trait::async_trait]
impl Environment for HostEnvironment {
    async fn prepare(&self) -> Result<()> {
        info!(workspace = %self.workspace.display(), "Preparing host environment");
        tokio::fs::create_dir_all(&self.workspace)
            .await
            .map_err(|e| {
                crosscheck_core::Error::Provisioning(format!("Failed to create workspace: {}", e))
            })?;
        Ok(())
    }

    fn working_dir(&self) -> &Path {
        &self.workspace
    }

    async fn cleanup(&self) -> Result<()> {
        info!(workspace = %self.workspace.display(), "Cleaning up host environment");
        if self.workspace.exists() {
            tokio::fs::remove_dir_all(&self.workspace)
                .await
                .map_err(|e| {
                    crosscheck_core::Error::Provisioning(format!(
                        "Failed to remove workspace: {}",
                        e
                    ))
                })?;
        }
        Ok(())
    }
}
