//! Per-job working directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use factlens_core::{Error, Result};

/// Scratch directory `<root>/<job_id>` holding every file one job produces.
///
/// The directory is removed by [`close`](Self::close); if the owning task
/// panics first, the inner `TempDir` removes it on drop.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    /// Create the working directory for `job_id`, creating `root` if needed.
    pub fn create(root: &Path, job_id: Uuid) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&job_id.to_string())
            .rand_bytes(0)
            .tempdir_in(root)
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create working directory for job {}: {}",
                    job_id, e
                ))
            })?;
        Ok(Self { dir })
    }

    /// [`create`](Self::create) on the blocking pool.
    pub async fn create_async(root: &Path, job_id: Uuid) -> Result<Self> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || Self::create(&root, job_id))
            .await
            .map_err(|e| Error::Internal(format!("Workspace task failed: {}", e)))?
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Expected location of the working directory for `job_id`.
    pub fn path_for(root: &Path, job_id: Uuid) -> PathBuf {
        root.join(job_id.to_string())
    }

    /// Remove the directory and everything in it.
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}
