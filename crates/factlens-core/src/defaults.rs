//! Centralized default constants for factlens.
//!
//! **This module is the single source of truth** for shared default values.
//! Config structs in the other crates read their fallbacks from here.

// =============================================================================
// ADMISSION & PIPELINE
// =============================================================================

/// Longest video (seconds) accepted at the probe stage.
pub const MAX_VIDEO_DURATION_SECS: u64 = 600;

/// Ceiling on jobs that may be processing at once.
pub const MAX_CONCURRENT_JOBS: usize = 3;

/// Root directory for per-job working directories.
pub const TEMP_DIR: &str = "/tmp/videos";

/// Default broadcast channel capacity for pipeline events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// MEDIA EXTRACTION
// =============================================================================

/// Maximum keyframes sent to analysis per video.
pub const MAX_KEYFRAMES: usize = 30;

/// Seconds between sampled keyframes.
pub const KEYFRAME_INTERVAL_SECS: u64 = 3;

/// Frames are scaled down to at most this height.
pub const MAX_FRAME_HEIGHT: u32 = 720;

/// Timeout applied to each yt-dlp / ffmpeg invocation.
pub const MEDIA_CMD_TIMEOUT_SECS: u64 = 300;

/// Default yt-dlp executable.
pub const YTDLP_BIN: &str = "yt-dlp";

/// Default ffmpeg executable.
pub const FFMPEG_BIN: &str = "ffmpeg";

// =============================================================================
// ANALYSIS
// =============================================================================

/// Total attempts made against the analysis service before giving up.
pub const AI_MAX_RETRIES: u32 = 3;

/// Delay before the first retry; doubled for each subsequent attempt.
pub const AI_RETRY_BASE_DELAY_MS: u64 = 2_000;

/// Default Gemini model.
pub const GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default Gemini API base URL.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// HTTP timeout for a single generateContent call.
pub const GEMINI_TIMEOUT_SECS: u64 = 180;

/// Polls made while an uploaded file is still being processed remotely.
pub const GEMINI_FILE_POLL_ATTEMPTS: u32 = 10;

/// Delay between file state polls.
pub const GEMINI_FILE_POLL_INTERVAL_MS: u64 = 1_000;

// =============================================================================
// SCORING
// =============================================================================

/// Points for an analysis that found nothing misleading or false.
pub const POINTS_BASE: i32 = 5;

/// Points for an analysis that flagged at least one misleading/false claim.
pub const POINTS_FLAGGED: i32 = 10;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8000;

/// Default bind address.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults_match_deployed_values() {
        assert_eq!(MAX_VIDEO_DURATION_SECS, 600);
        assert_eq!(MAX_CONCURRENT_JOBS, 3);
        assert_eq!(MAX_KEYFRAMES, 30);
        assert_eq!(KEYFRAME_INTERVAL_SECS, 3);
        assert_eq!(MAX_FRAME_HEIGHT, 720);
    }

    #[test]
    fn test_flagged_points_exceed_base() {
        assert!(POINTS_FLAGGED > POINTS_BASE);
    }
}
