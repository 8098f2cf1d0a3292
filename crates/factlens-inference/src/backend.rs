//! Single-attempt analysis backends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use factlens_core::Result;

/// A multimodal model provider, split into the three phases of one analysis.
///
/// `prepare` runs once per analysis and turns local files into whatever the
/// provider needs to reference them. `generate` is a single model call and
/// may be invoked repeatedly against the same prepared input. `release`
/// frees any remote resources `prepare` created.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Provider-specific handle to the prepared media.
    type Prepared: Send + Sync;

    async fn prepare(&self, audio: &Path, keyframes: &[PathBuf]) -> Result<Self::Prepared>;

    /// One model call; returns the raw response text.
    async fn generate(&self, prepared: &Self::Prepared) -> Result<String>;

    /// Best-effort cleanup. Errors are reported but never fail the analysis.
    async fn release(&self, prepared: Self::Prepared) -> Result<()>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// MIME type sent for a media file, keyed on its extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
