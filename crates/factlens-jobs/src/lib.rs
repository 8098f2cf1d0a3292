//! # factlens-jobs
//!
//! Job admission and the video analysis pipeline for factlens.
//!
//! This crate provides:
//! - The in-process job table with atomic admission control
//! - The pipeline runner (probe, acquire, analyze, assemble, persist)
//! - Progress notifications via broadcast channels
//! - yt-dlp / ffmpeg media acquisition behind [`MediaAcquirer`]
//! - Per-job working directories that are always cleaned up
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use factlens_jobs::{MediaConfig, PipelineConfig, PipelineRunner, YtDlpAcquirer};
//!
//! let runner = PipelineRunner::new(
//!     PipelineConfig::from_env(),
//!     Arc::new(YtDlpAcquirer::new(MediaConfig::from_env())),
//!     analyzer,
//!     store,
//!     activity,
//! );
//!
//! let submission = runner
//!     .submit(AnalyzeRequest { url: "https://youtu.be/abc".into(), user_id: None })
//!     .await?;
//!
//! // Listen for events
//! let mut events = runner.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//! ```

pub mod config;
pub mod media;
pub mod process;
pub mod runner;
pub mod table;
pub mod workspace;

// Re-export core types
pub use factlens_core::*;

pub use config::{MediaConfig, PipelineConfig};
pub use media::{subsample_frames, YtDlpAcquirer};
pub use process::{run_command, ProcessOutput};
pub use runner::{PipelineEvent, PipelineRunner, PipelineStage};
pub use table::{JobTable, JobTicket};
pub use workspace::JobWorkspace;
