//! Core traits for factlens collaborators.
//!
//! Each external system the pipeline talks to sits behind one of these traits
//! so the runner can be driven by real backends in production and by stubs in
//! tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AnalysisResult, MediaBundle, VideoInfo};

// =============================================================================
// MEDIA ACQUISITION
// =============================================================================

/// Fetches video metadata and local media artifacts for a URL.
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    /// Read title and duration without downloading the video.
    async fn probe(&self, url: &str) -> Result<VideoInfo>;

    /// Download the video into `work_dir` and extract its audio track and
    /// keyframes. Every file produced must live under `work_dir`.
    async fn acquire(&self, url: &str, work_dir: &Path) -> Result<MediaBundle>;

    /// Check if the external tools are available.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// Produces a structured fact-check analysis from audio and keyframes.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, audio: &Path, keyframes: &[PathBuf]) -> Result<AnalysisResult>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Persistent cache of analysis results keyed by [`crate::cache_key`].
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Point lookup by key.
    async fn lookup(&self, key: &str) -> Result<Option<AnalysisResult>>;

    /// Insert or replace the result for `key`, returning the persisted row id.
    async fn upsert(&self, key: &str, raw_url: &str, result: &AnalysisResult) -> Result<String>;
}

/// Records per-user scoring activity for a completed analysis.
#[async_trait]
pub trait ActivityRecorder: Send + Sync {
    async fn record(&self, user_id: &str, analysis_id: &str, points: i32) -> Result<()>;
}
