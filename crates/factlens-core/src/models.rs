//! Core data models for factlens.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::defaults::{POINTS_BASE, POINTS_FLAGGED};
use crate::platform::Platform;

/// Read a JSON `null` as the field's default value.
///
/// Model output routinely carries `null` where a string or list is expected.
fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// JOBS
// =============================================================================

/// Lifecycle state of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobState {
    /// Whether the job counts against the admission ceiling.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Pending | JobState::Processing)
    }

    /// Whether the job has reached a final state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One URL submission tracked through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub url: String,
    pub state: JobState,
    /// Present only when `state == Complete`.
    pub result: Option<AnalysisResult>,
    /// Present only when `state == Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A freshly submitted job that has not started yet.
    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            state: JobState::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// A job born complete, used when the result store already has the answer.
    pub fn completed(url: impl Into<String>, result: AnalysisResult) -> Self {
        let now = Utc::now();
        Self {
            state: JobState::Complete,
            result: Some(result),
            started_at: Some(now),
            finished_at: Some(now),
            ..Self::pending(url)
        }
    }
}

/// Response returned to the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub job_id: Uuid,
    pub status: JobState,
}

/// Caller-supplied submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

// =============================================================================
// ANALYSIS RESULT
// =============================================================================

/// Fact-check verdict for a single claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Verdict {
    True,
    Misleading,
    False,
    /// Anything the model could not (or did not) verify.
    #[default]
    Unverified,
}

impl From<String> for Verdict {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Verdict::True,
            "misleading" => Verdict::Misleading,
            "false" => Verdict::False,
            _ => Verdict::Unverified,
        }
    }
}

impl Verdict {
    /// Verdicts that earn the higher point award.
    pub fn is_flagged(self) -> bool {
        matches!(self, Verdict::Misleading | Verdict::False)
    }
}

/// Where in the video a claim was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ClaimType {
    #[default]
    Spoken,
    Visual,
    Both,
}

impl From<String> for ClaimType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "visual" => ClaimType::Visual,
            "both" => ClaimType::Both,
            _ => ClaimType::Spoken,
        }
    }
}

/// A verifiable claim extracted from the video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(default, deserialize_with = "null_default")]
    pub claim: String,
    #[serde(rename = "type", default, deserialize_with = "null_default")]
    pub claim_type: ClaimType,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub verdict: Verdict,
    #[serde(default, deserialize_with = "null_default")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub explanation: String,
    #[serde(default, deserialize_with = "null_default")]
    pub evidence_for: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub evidence_against: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub sources: Vec<String>,
}

impl Claim {
    /// Force confidence into [0, 1]; NaN becomes 0.
    pub fn sanitize(&mut self) {
        self.confidence = if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        };
        if let Some(ts) = &self.timestamp {
            if ts.trim().is_empty() || ts.eq_ignore_ascii_case("null") {
                self.timestamp = None;
            }
        }
    }
}

/// How the topic is framed across the political spectrum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perspectives {
    #[serde(default, deserialize_with = "null_default")]
    pub left: String,
    #[serde(default, deserialize_with = "null_default")]
    pub center: String,
    #[serde(default, deserialize_with = "null_default")]
    pub right: String,
}

/// Overall ideological lean of a video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum BiasLean {
    /// Non-political content, or no detectable lean.
    #[default]
    #[serde(rename = "none")]
    Unassessed,
    Left,
    LeanLeft,
    Center,
    LeanRight,
    Right,
}

impl From<String> for BiasLean {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "left" => BiasLean::Left,
            "lean_left" => BiasLean::LeanLeft,
            "center" | "centre" => BiasLean::Center,
            "lean_right" => BiasLean::LeanRight,
            "right" => BiasLean::Right,
            _ => BiasLean::Unassessed,
        }
    }
}

/// A visual flagged as misleading (doctored, truncated, out of context).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MisleadingVisual {
    #[serde(default, deserialize_with = "null_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasAnalysis {
    #[serde(default, deserialize_with = "null_default")]
    pub overall_bias: BiasLean,
    #[serde(default, deserialize_with = "null_default")]
    pub manipulation_tactics: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub misleading_visuals: Vec<MisleadingVisual>,
}

/// The structured analysis served to clients and persisted to the result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub platform: Platform,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default, deserialize_with = "null_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_default")]
    pub transcript: String,
    #[serde(default, deserialize_with = "null_default")]
    pub claims: Vec<Claim>,
    #[serde(default, deserialize_with = "null_default")]
    pub perspectives: Perspectives,
    #[serde(default, deserialize_with = "null_default")]
    pub bias_analysis: BiasAnalysis,
    #[serde(default = "default_points")]
    pub points_awarded: i32,
}

fn default_points() -> i32 {
    POINTS_BASE
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            title: String::new(),
            platform: Platform::default(),
            duration_seconds: None,
            summary: String::new(),
            transcript: String::new(),
            claims: Vec::new(),
            perspectives: Perspectives::default(),
            bias_analysis: BiasAnalysis::default(),
            points_awarded: POINTS_BASE,
        }
    }
}

impl AnalysisResult {
    /// Enforce claim invariants and recompute the point award.
    pub fn sanitize(&mut self) {
        for claim in &mut self.claims {
            claim.sanitize();
        }
        self.points_awarded = calculate_points(&self.claims);
    }

    /// Fill gaps the analysis left with metadata gathered while acquiring media.
    ///
    /// Platform and duration always come from the acquirer; the title only
    /// when the analysis produced none.
    pub fn merge_media_info(&mut self, platform: Platform, info: &VideoInfo) {
        self.platform = platform;
        self.duration_seconds = Some(info.duration_secs);
        let title = self.title.trim();
        if title.is_empty() || title.eq_ignore_ascii_case("unknown") {
            self.title = info.title.clone();
        }
    }
}

/// Point award for a set of claims.
pub fn calculate_points(claims: &[Claim]) -> i32 {
    if claims.iter().any(|c| c.verdict.is_flagged()) {
        POINTS_FLAGGED
    } else {
        POINTS_BASE
    }
}

// =============================================================================
// MEDIA
// =============================================================================

/// Metadata available without downloading the video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoInfo {
    pub title: String,
    pub duration_secs: u64,
}

/// Local artifacts extracted for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaBundle {
    pub audio: PathBuf,
    /// Keyframes in temporal order.
    pub keyframes: Vec<PathBuf>,
}
