//! Pipeline and media extraction configuration.

use std::path::PathBuf;
use std::time::Duration;

use factlens_core::defaults;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Configuration for the pipeline runner.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Longest video accepted at the probe stage, in seconds.
    pub max_duration_secs: u64,
    /// Admission ceiling on active jobs.
    pub max_concurrent_jobs: usize,
    /// Root under which per-job working directories are created.
    pub temp_dir: PathBuf,
    /// Evict finished jobs older than this at admission time. `None` keeps
    /// them for the life of the process.
    pub job_retention: Option<Duration>,
    /// Capacity of the pipeline event broadcast channel.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: defaults::MAX_VIDEO_DURATION_SECS,
            max_concurrent_jobs: defaults::MAX_CONCURRENT_JOBS,
            temp_dir: PathBuf::from(defaults::TEMP_DIR),
            job_retention: None,
            event_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `MAX_VIDEO_DURATION` | `600` | Longest accepted video (seconds) |
    /// | `MAX_CONCURRENT_JOBS` | `3` | Admission ceiling |
    /// | `TEMP_DIR` | `/tmp/videos` | Root for per-job working directories |
    /// | `JOB_RETENTION_SECS` | unset | Evict finished jobs older than this |
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            max_duration_secs: env_parse("MAX_VIDEO_DURATION").unwrap_or(base.max_duration_secs),
            max_concurrent_jobs: env_parse::<usize>("MAX_CONCURRENT_JOBS")
                .unwrap_or(base.max_concurrent_jobs)
                .max(1),
            temp_dir: std::env::var("TEMP_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(base.temp_dir),
            job_retention: env_parse::<u64>("JOB_RETENTION_SECS").map(Duration::from_secs),
            event_capacity: base.event_capacity,
        }
    }

    pub fn with_max_duration(mut self, secs: u64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_job_retention(mut self, retention: Duration) -> Self {
        self.job_retention = Some(retention);
        self
    }
}

/// Configuration for yt-dlp / ffmpeg based acquisition.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
    /// Upper bound on keyframes handed to analysis.
    pub max_keyframes: usize,
    /// Seconds between sampled frames.
    pub keyframe_interval_secs: u64,
    /// Downloads and frames are capped at this height.
    pub max_frame_height: u32,
    /// Per-command timeout.
    pub command_timeout: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: defaults::YTDLP_BIN.to_string(),
            ffmpeg_path: defaults::FFMPEG_BIN.to_string(),
            max_keyframes: defaults::MAX_KEYFRAMES,
            keyframe_interval_secs: defaults::KEYFRAME_INTERVAL_SECS,
            max_frame_height: defaults::MAX_FRAME_HEIGHT,
            command_timeout: Duration::from_secs(defaults::MEDIA_CMD_TIMEOUT_SECS),
        }
    }
}

impl MediaConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `YTDLP_PATH` | `yt-dlp` |
    /// | `FFMPEG_PATH` | `ffmpeg` |
    /// | `MAX_KEYFRAMES` | `30` |
    /// | `KEYFRAME_INTERVAL_SECONDS` | `3` |
    /// | `MAX_FRAME_HEIGHT` | `720` |
    /// | `MEDIA_CMD_TIMEOUT_SECS` | `300` |
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            ytdlp_path: std::env::var("YTDLP_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(base.ytdlp_path),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(base.ffmpeg_path),
            max_keyframes: env_parse::<usize>("MAX_KEYFRAMES")
                .unwrap_or(base.max_keyframes)
                .max(1),
            keyframe_interval_secs: env_parse::<u64>("KEYFRAME_INTERVAL_SECONDS")
                .unwrap_or(base.keyframe_interval_secs)
                .max(1),
            max_frame_height: env_parse::<u32>("MAX_FRAME_HEIGHT")
                .unwrap_or(base.max_frame_height)
                .max(2),
            command_timeout: env_parse::<u64>("MEDIA_CMD_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(base.command_timeout),
        }
    }

    pub fn with_binaries(mut self, ytdlp: impl Into<String>, ffmpeg: impl Into<String>) -> Self {
        self.ytdlp_path = ytdlp.into();
        self.ffmpeg_path = ffmpeg.into();
        self
    }

    pub fn with_max_keyframes(mut self, max: usize) -> Self {
        self.max_keyframes = max;
        self
    }

    pub fn with_keyframe_interval(mut self, secs: u64) -> Self {
        self.keyframe_interval_secs = secs;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}
