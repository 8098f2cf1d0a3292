//! Gemini backend over the Generative Language REST API.
//!
//! Media reaches the model in one of two ways, chosen by [`InputStrategy`]:
//! inline as base64 parts in the request body, or uploaded through the Files
//! API and referenced by URI. Uploaded files are deleted on release.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use factlens_core::defaults::{
    GEMINI_BASE_URL, GEMINI_FILE_POLL_ATTEMPTS, GEMINI_FILE_POLL_INTERVAL_MS, GEMINI_MODEL,
    GEMINI_TIMEOUT_SECS,
};
use factlens_core::{Error, Result};

use crate::backend::{mime_type_for, AnalysisBackend};
use crate::prompt::ANALYSIS_PROMPT;

/// How media files are handed to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputStrategy {
    /// Base64 parts embedded in every generateContent request.
    #[default]
    Inline,
    /// Upload once through the Files API, reference by URI.
    Upload,
}

impl InputStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputStrategy::Inline => "inline",
            InputStrategy::Upload => "upload",
        }
    }
}

impl FromStr for InputStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(InputStrategy::Inline),
            "upload" | "files" => Ok(InputStrategy::Upload),
            other => Err(Error::Config(format!(
                "Unknown analysis input strategy '{}' (expected 'inline' or 'upload')",
                other
            ))),
        }
    }
}

/// Configuration for [`GeminiBackend`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub strategy: InputStrategy,
    pub timeout_secs: u64,
    /// Polls made while an uploaded file is still processing.
    pub file_poll_attempts: u32,
    pub file_poll_interval: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: GEMINI_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            strategy: InputStrategy::default(),
            timeout_secs: GEMINI_TIMEOUT_SECS,
            file_poll_attempts: GEMINI_FILE_POLL_ATTEMPTS,
            file_poll_interval: Duration::from_millis(GEMINI_FILE_POLL_INTERVAL_MS),
        }
    }

    /// Create from environment variables.
    ///
    /// `GEMINI_API_KEY` is required; everything else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            if !model.is_empty() {
                config.model = model;
            }
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            if !base_url.is_empty() {
                config = config.with_base_url(base_url);
            }
        }
        if let Ok(strategy) = std::env::var("ANALYSIS_INPUT_STRATEGY") {
            config.strategy = strategy.parse()?;
        }
        if let Some(secs) = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.timeout_secs = secs;
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_strategy(mut self, strategy: InputStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_file_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.file_poll_attempts = attempts;
        self.file_poll_interval = interval;
        self
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    Inline { inline_data: Blob },
    File { file_data: FileData },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Blob {
    pub mime_type: String,
    pub data: String, // base64 encoded
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: &'a [Part],
}

#[derive(Serialize)]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::Analysis("Gemini returned no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Analysis(format!(
                "Gemini returned no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

/// A file held by the Files API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    /// Resource name, e.g. `files/abc123`.
    name: String,
    uri: String,
    mime_type: Option<String>,
    state: Option<String>,
}

impl RemoteFile {
    fn is_processing(&self) -> bool {
        self.state.as_deref() == Some("PROCESSING")
    }

    fn is_failed(&self) -> bool {
        self.state.as_deref() == Some("FAILED")
    }
}

/// Media prepared for generateContent calls.
#[derive(Debug, Clone, Default)]
pub struct GeminiInput {
    /// Prompt followed by audio and keyframe parts, in order.
    pub parts: Vec<Part>,
    /// Files API resource names to delete on release.
    pub uploaded: Vec<String>,
}

// =============================================================================
// BACKEND
// =============================================================================

pub struct GeminiBackend {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1beta/{}", self.config.base_url, path)
    }

    async fn inline_part(path: &Path) -> Result<Part> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Part::Inline {
            inline_data: Blob {
                mime_type: mime_type_for(path).to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        })
    }

    async fn upload_file(&self, path: &Path) -> Result<RemoteFile> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_type_for(path);
        let url = format!("{}/upload/v1beta/files", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str()), ("uploadType", "media")])
            .header(CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                Error::Analysis(format!("File upload failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Analysis(format!(
                "File upload returned {}: {}",
                status, body
            )));
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            Error::Analysis(format!("Failed to parse file upload response: {}", e))
        })?;
        debug!(
            file = %uploaded.file.name,
            mime_type,
            state = uploaded.file.state.as_deref().unwrap_or("unknown"),
            "Uploaded media file"
        );
        Ok(uploaded.file)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        let response = self
            .client
            .get(self.api_url(name))
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                Error::Analysis(format!("File status request failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Analysis(format!(
                "File status returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Analysis(format!("Failed to parse file status: {}", e)))
    }

    /// Poll until the file leaves the PROCESSING state.
    async fn wait_until_active(&self, mut file: RemoteFile) -> Result<RemoteFile> {
        let mut polls = 0;
        while file.is_processing() {
            if polls >= self.config.file_poll_attempts {
                return Err(Error::Analysis(format!(
                    "File {} still processing after {} polls",
                    file.name, polls
                )));
            }
            tokio::time::sleep(self.config.file_poll_interval).await;
            file = self.get_file(&file.name).await?;
            polls += 1;
        }
        if file.is_failed() {
            return Err(Error::Analysis(format!(
                "File {} failed remote processing",
                file.name
            )));
        }
        Ok(file)
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.api_url(name))
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                Error::Analysis(format!("File delete failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            return Err(Error::Analysis(format!(
                "File delete returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Delete every named file, returning the number of failures.
    async fn delete_files(&self, names: &[String]) -> usize {
        let mut failures = 0;
        for name in names {
            if let Err(e) = self.delete_file(name).await {
                warn!(file = %name, error = %e, "Failed to delete uploaded file");
                failures += 1;
            }
        }
        failures
    }

    async fn prepare_uploaded(&self, media: &[PathBuf], input: &mut GeminiInput) -> Result<()> {
        for path in media {
            let file = self.upload_file(path).await?;
            input.uploaded.push(file.name.clone());
            let file = self.wait_until_active(file).await?;
            input.parts.push(Part::File {
                file_data: FileData {
                    mime_type: file
                        .mime_type
                        .unwrap_or_else(|| mime_type_for(path).to_string()),
                    file_uri: file.uri,
                },
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisBackend for GeminiBackend {
    type Prepared = GeminiInput;

    async fn prepare(&self, audio: &Path, keyframes: &[PathBuf]) -> Result<GeminiInput> {
        let mut media = Vec::with_capacity(keyframes.len() + 1);
        media.push(audio.to_path_buf());
        media.extend(keyframes.iter().cloned());

        let mut input = GeminiInput::default();
        input.parts.push(Part::Text {
            text: ANALYSIS_PROMPT.to_string(),
        });

        match self.config.strategy {
            InputStrategy::Inline => {
                for path in &media {
                    input.parts.push(Self::inline_part(path).await?);
                }
            }
            InputStrategy::Upload => {
                if let Err(e) = self.prepare_uploaded(&media, &mut input).await {
                    self.delete_files(&input.uploaded).await;
                    return Err(e);
                }
            }
        }

        debug!(
            model = %self.config.model,
            strategy = self.config.strategy.as_str(),
            keyframes = keyframes.len(),
            "Prepared analysis input"
        );
        Ok(input)
    }

    async fn generate(&self, prepared: &GeminiInput) -> Result<String> {
        let request = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: &prepared.parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let url = self.api_url(&format!("models/{}:generateContent", self.config.model));
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                Error::Analysis(format!("Gemini request failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Analysis(format!(
                "Gemini API returned {}: {}",
                status, body
            )));
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Analysis(format!("Failed to parse Gemini response: {}", e)))?;

        result.into_text()
    }

    async fn release(&self, prepared: GeminiInput) -> Result<()> {
        if prepared.uploaded.is_empty() {
            return Ok(());
        }
        let failures = self.delete_files(&prepared.uploaded).await;
        if failures > 0 {
            return Err(Error::Analysis(format!(
                "{} of {} uploaded files could not be deleted",
                failures,
                prepared.uploaded.len()
            )));
        }
        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = GeminiConfig::new("key");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.base_url, "https://generativelanguage.googleapis.com");
        assert_eq!(config.strategy, InputStrategy::Inline);
        assert_eq!(config.timeout_secs, 180);
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let config = GeminiConfig::new("key").with_base_url("http://localhost:9000/");
        assert_eq!(config.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_input_strategy_parse() {
        assert_eq!("inline".parse::<InputStrategy>().unwrap(), InputStrategy::Inline);
        assert_eq!(" Upload ".parse::<InputStrategy>().unwrap(), InputStrategy::Upload);
        assert_eq!("files".parse::<InputStrategy>().unwrap(), InputStrategy::Upload);
        assert!(matches!(
            "stream".parse::<InputStrategy>(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_request_serialization() {
        let parts = vec![
            Part::Text {
                text: "prompt".to_string(),
            },
            Part::Inline {
                inline_data: Blob {
                    mime_type: "audio/mpeg".to_string(),
                    data: "AAAA".to_string(),
                },
            },
            Part::File {
                file_data: FileData {
                    mime_type: "image/jpeg".to_string(),
                    file_uri: "https://files/abc".to_string(),
                },
            },
        ];
        let request = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: &parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["generationConfig"]["response_mime_type"],
            "application/json"
        );
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "prompt");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "audio/mpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "AAAA");
        assert_eq!(parts[2]["file_data"]["file_uri"], "https://files/abc");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]},
                       "finishReason": "STOP"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_text().unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_response_without_candidates_is_error() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(response.into_text().is_err());
    }

    #[test]
    fn test_response_without_text_reports_finish_reason() {
        let json = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let err = response.into_text().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_remote_file_states() {
        let file: RemoteFile = serde_json::from_str(
            r#"{"name": "files/a", "uri": "https://u", "mimeType": "audio/mpeg", "state": "PROCESSING"}"#,
        )
        .unwrap();
        assert!(file.is_processing());
        assert!(!file.is_failed());
        assert_eq!(file.mime_type.as_deref(), Some("audio/mpeg"));
    }
}
