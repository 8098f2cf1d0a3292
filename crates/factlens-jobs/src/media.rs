//! Video acquisition through yt-dlp and ffmpeg.
//!
//! Pipeline per job:
//! 1. Probe metadata with yt-dlp (no download)
//! 2. Download the video, height capped, into the job's working directory
//! 3. Extract the audio track to MP3
//! 4. Sample one frame every N seconds, scaled down, and thin the set to the
//!    keyframe limit with a uniform stride

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use factlens_core::{Error, MediaAcquirer, MediaBundle, Result, VideoInfo};

use crate::config::MediaConfig;
use crate::process::run_command;

/// Stem of the downloaded video file inside the working directory.
const VIDEO_STEM: &str = "video";

/// Subset of yt-dlp's info JSON.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
}

/// Parse `yt-dlp --dump-single-json` output.
///
/// Fractional durations round up so the length check never admits a video
/// that is even slightly over the limit. A missing duration reads as zero.
pub fn parse_video_info(json: &str) -> Result<VideoInfo> {
    let info: YtDlpInfo = serde_json::from_str(json)
        .map_err(|e| Error::Acquisition(format!("Unreadable video metadata: {}", e)))?;
    let duration_secs = info
        .duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.ceil() as u64)
        .unwrap_or(0);
    Ok(VideoInfo {
        title: info.title.unwrap_or_default(),
        duration_secs,
    })
}

/// yt-dlp format selector preferring MP4 at or below `max_height`.
pub fn format_selector(max_height: u32) -> String {
    format!(
        "best[height<={h}][ext=mp4]/bestvideo[height<={h}]+bestaudio/best[height<={h}]/best",
        h = max_height
    )
}

/// ffmpeg filter sampling one frame per `interval_secs`, no taller than
/// `max_height`, preserving aspect ratio with an even width.
pub fn keyframe_filter(interval_secs: u64, max_height: u32) -> String {
    format!(
        "fps=1/{},scale=-2:'min({},ih)'",
        interval_secs.max(1),
        max_height
    )
}

/// Keep at most `max` frames, spread evenly across the input.
///
/// Frame `i` of the output is input frame `floor(i * n / max)`, so the first
/// frame is always kept and temporal order is preserved.
pub fn subsample_frames(frames: Vec<PathBuf>, max: usize) -> Vec<PathBuf> {
    let n = frames.len();
    if max == 0 {
        return Vec::new();
    }
    if n <= max {
        return frames;
    }
    let mut slots: Vec<Option<PathBuf>> = frames.into_iter().map(Some).collect();
    (0..max)
        .filter_map(|i| slots[i * n / max].take())
        .collect()
}

/// Files in `dir` whose extension matches `ext`, sorted by name.
async fn list_files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// The file yt-dlp wrote for `stem`, ignoring unfinished `.part` downloads.
async fn find_download(dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.file_stem().and_then(|s| s.to_str()) == Some(stem)
            && path.extension().and_then(|e| e.to_str()) != Some("part")
        {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// [`MediaAcquirer`] backed by the yt-dlp and ffmpeg executables.
pub struct YtDlpAcquirer {
    config: MediaConfig,
}

impl YtDlpAcquirer {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    async fn download(&self, url: &str, work_dir: &Path) -> Result<PathBuf> {
        let template = work_dir
            .join(format!("{}.%(ext)s", VIDEO_STEM))
            .to_string_lossy()
            .into_owned();
        let format = format_selector(self.config.max_frame_height);

        run_command(
            &self.config.ytdlp_path,
            [
                "--no-playlist",
                "--no-warnings",
                "--quiet",
                "-f",
                format.as_str(),
                "--merge-output-format",
                "mp4",
                "-o",
                template.as_str(),
                "--",
                url,
            ],
            self.config.command_timeout,
        )
        .await?;

        find_download(work_dir, VIDEO_STEM)
            .await?
            .ok_or_else(|| {
                Error::Acquisition("Video download failed: no output file found".to_string())
            })
    }

    async fn extract_audio(&self, video: &Path, work_dir: &Path) -> Result<PathBuf> {
        let audio = work_dir.join("audio.mp3");
        run_command(
            &self.config.ffmpeg_path,
            [
                OsStr::new("-hide_banner"),
                OsStr::new("-loglevel"),
                OsStr::new("error"),
                OsStr::new("-i"),
                video.as_os_str(),
                OsStr::new("-vn"),
                OsStr::new("-acodec"),
                OsStr::new("libmp3lame"),
                OsStr::new("-q:a"),
                OsStr::new("4"),
                OsStr::new("-y"),
                audio.as_os_str(),
            ],
            self.config.command_timeout,
        )
        .await?;

        if !tokio::fs::try_exists(&audio).await? {
            return Err(Error::Acquisition(
                "Audio extraction produced no output".to_string(),
            ));
        }
        Ok(audio)
    }

    async fn extract_keyframes(&self, video: &Path, work_dir: &Path) -> Result<Vec<PathBuf>> {
        let frames_dir = work_dir.join("frames");
        tokio::fs::create_dir_all(&frames_dir).await?;
        let pattern = frames_dir.join("frame_%04d.jpg");
        let filter = keyframe_filter(
            self.config.keyframe_interval_secs,
            self.config.max_frame_height,
        );

        run_command(
            &self.config.ffmpeg_path,
            [
                OsStr::new("-hide_banner"),
                OsStr::new("-loglevel"),
                OsStr::new("error"),
                OsStr::new("-i"),
                video.as_os_str(),
                OsStr::new("-vf"),
                OsStr::new(&filter),
                OsStr::new("-q:v"),
                OsStr::new("3"),
                OsStr::new("-y"),
                pattern.as_os_str(),
            ],
            self.config.command_timeout,
        )
        .await?;

        let frames = list_files_with_extension(&frames_dir, "jpg").await?;
        let extracted = frames.len();
        let frames = subsample_frames(frames, self.config.max_keyframes);
        debug!(extracted, kept = frames.len(), "Sampled keyframes");
        Ok(frames)
    }
}

#[async_trait]
impl MediaAcquirer for YtDlpAcquirer {
    async fn probe(&self, url: &str) -> Result<VideoInfo> {
        let output = run_command(
            &self.config.ytdlp_path,
            [
                "--dump-single-json",
                "--skip-download",
                "--no-playlist",
                "--no-warnings",
                "--",
                url,
            ],
            self.config.command_timeout,
        )
        .await?;
        parse_video_info(&output.stdout)
    }

    async fn acquire(&self, url: &str, work_dir: &Path) -> Result<MediaBundle> {
        let video = self.download(url, work_dir).await?;
        let audio = self.extract_audio(&video, work_dir).await?;
        let keyframes = self.extract_keyframes(&video, work_dir).await?;

        info!(
            video = %video.display(),
            keyframes = keyframes.len(),
            "Media acquired"
        );
        Ok(MediaBundle { audio, keyframes })
    }

    async fn health_check(&self) -> Result<bool> {
        let timeout = std::time::Duration::from_secs(10);
        let ytdlp = run_command(&self.config.ytdlp_path, ["--version"], timeout).await;
        let ffmpeg = run_command(&self.config.ffmpeg_path, ["-version"], timeout).await;
        Ok(ytdlp.is_ok() && ffmpeg.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(n: usize) -> Vec<PathBuf> {
        (1..=n)
            .map(|i| PathBuf::from(format!("frame_{:04}.jpg", i)))
            .collect()
    }

    #[test]
    fn test_parse_video_info() {
        let info = parse_video_info(r#"{"title": "Budget speech", "duration": 212, "id": "x"}"#)
            .unwrap();
        assert_eq!(info.title, "Budget speech");
        assert_eq!(info.duration_secs, 212);
    }

    #[test]
    fn test_parse_video_info_fractional_duration_rounds_up() {
        let info = parse_video_info(r#"{"title": "t", "duration": 600.2}"#).unwrap();
        assert_eq!(info.duration_secs, 601);
    }

    #[test]
    fn test_parse_video_info_missing_fields() {
        let info = parse_video_info(r#"{"duration": null}"#).unwrap();
        assert_eq!(info.title, "");
        assert_eq!(info.duration_secs, 0);
    }

    #[test]
    fn test_parse_video_info_garbage() {
        let err = parse_video_info("ERROR: not json").unwrap_err();
        assert!(matches!(err, Error::Acquisition(_)));
    }

    #[test]
    fn test_format_selector_caps_height() {
        let selector = format_selector(720);
        assert!(selector.starts_with("best[height<=720][ext=mp4]"));
        assert!(!selector.contains("1080"));
    }

    #[test]
    fn test_keyframe_filter() {
        assert_eq!(keyframe_filter(3, 720), "fps=1/3,scale=-2:'min(720,ih)'");
        assert_eq!(keyframe_filter(0, 480), "fps=1/1,scale=-2:'min(480,ih)'");
    }

    #[test]
    fn test_subsample_keeps_short_lists() {
        assert_eq!(subsample_frames(paths(5), 30), paths(5));
        assert!(subsample_frames(paths(0), 30).is_empty());
    }

    #[test]
    fn test_subsample_uniform_stride() {
        let kept = subsample_frames(paths(100), 30);
        assert_eq!(kept.len(), 30);
        assert_eq!(kept[0], PathBuf::from("frame_0001.jpg"));
        // floor(1 * 100 / 30) = 3 -> fourth frame
        assert_eq!(kept[1], PathBuf::from("frame_0004.jpg"));
        // floor(29 * 100 / 30) = 96 -> 97th frame
        assert_eq!(kept[29], PathBuf::from("frame_0097.jpg"));
        let mut sorted = kept.clone();
        sorted.sort();
        assert_eq!(kept, sorted);
    }

    #[test]
    fn test_subsample_just_over_limit() {
        let kept = subsample_frames(paths(31), 30);
        assert_eq!(kept.len(), 30);
        kept.windows(2).for_each(|w| assert_ne!(w[0], w[1]));
    }

    #[tokio::test]
    async fn test_list_files_with_extension_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_0002.jpg", "frame_0001.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let files = list_files_with_extension(dir.path(), "jpg").await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["frame_0001.jpg", "frame_0002.jpg"]);
    }

    #[tokio::test]
    async fn test_find_download_skips_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("video.part"), b"x").unwrap();
        assert!(find_download(dir.path(), "video").await.unwrap().is_none());

        std::fs::write(dir.path().join("video.mp4"), b"x").unwrap();
        let found = find_download(dir.path(), "video").await.unwrap().unwrap();
        assert_eq!(found, dir.path().join("video.mp4"));
    }

    #[tokio::test]
    async fn test_probe_rejects_non_json_output() {
        // `echo` exits 0 but prints its arguments instead of metadata.
        let acquirer =
            YtDlpAcquirer::new(MediaConfig::default().with_binaries("echo", "ffmpeg"));
        let err = acquirer.probe("https://youtu.be/abc").await.unwrap_err();
        assert!(err.to_string().contains("Unreadable video metadata"));
    }

    #[tokio::test]
    async fn test_download_without_output_file_is_error() {
        let work = tempfile::tempdir().unwrap();
        let acquirer =
            YtDlpAcquirer::new(MediaConfig::default().with_binaries("true", "ffmpeg"));
        let err = acquirer
            .acquire("https://youtu.be/abc", work.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Acquisition(_)));
        assert!(err.to_string().contains("no output file"));
    }

    #[tokio::test]
    async fn test_health_check_reports_missing_tools() {
        let acquirer = YtDlpAcquirer::new(
            MediaConfig::default().with_binaries("factlens-no-ytdlp", "factlens-no-ffmpeg"),
        );
        assert!(!acquirer.health_check().await.unwrap());
    }
}
