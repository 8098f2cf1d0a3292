//! Scripted analysis backend for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use factlens_inference::mock::{sample_response_json, ScriptedBackend};
//! use factlens_inference::{RetryPolicy, RetryingAnalyzer};
//!
//! let backend = ScriptedBackend::new(vec![
//!     Err("HTTP 503".to_string()),
//!     Ok(sample_response_json()),
//! ]);
//! let analyzer = RetryingAnalyzer::new(backend.clone(), RetryPolicy::default());
//! ```

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use factlens_core::{Error, Result};

use crate::backend::AnalysisBackend;

/// A valid analysis document with one false claim.
pub fn sample_response_json() -> String {
    serde_json::json!({
        "title": "Scripted analysis",
        "summary": "A speaker makes a claim about tax rates.",
        "transcript": "Taxes doubled last year.",
        "claims": [{
            "claim": "Taxes doubled last year",
            "type": "spoken",
            "timestamp": "0:03",
            "verdict": "false",
            "confidence": 0.92,
            "explanation": "Published rates rose by two percent.",
            "evidence_for": [],
            "evidence_against": ["Treasury rate tables"],
            "sources": []
        }],
        "perspectives": {
            "left": "Frames the claim as fearmongering.",
            "center": "Rates rose modestly.",
            "right": "Frames the rise as a burden."
        },
        "bias_analysis": {
            "overall_bias": "lean_right",
            "manipulation_tactics": ["cherry_picked_stats"],
            "misleading_visuals": []
        }
    })
    .to_string()
}

#[derive(Default)]
struct ScriptState {
    script: VecDeque<std::result::Result<String, String>>,
    prepare_calls: usize,
    prepare_failures: usize,
    release_calls: usize,
    generate_offsets: Vec<Instant>,
}

/// Backend whose `generate` calls replay a fixed script of outcomes.
///
/// `Err(msg)` entries become [`Error::Analysis`]. Once the script is
/// exhausted every further call fails.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
    fail_prepare: bool,
}

impl ScriptedBackend {
    pub fn new(script: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                script: script.into(),
                ..Default::default()
            })),
            fail_prepare: false,
        }
    }

    /// Backend that returns `response` for every call.
    pub fn always(response: impl Into<String>, times: usize) -> Self {
        let response = response.into();
        Self::new((0..times).map(|_| Ok(response.clone())).collect())
    }

    /// Make the first `n` `prepare` calls fail with a remote error, as if an
    /// upload was rejected.
    pub fn with_prepare_failures(self, n: usize) -> Self {
        self.lock().prepare_failures = n;
        self
    }

    /// Make `prepare` fail, as if the inputs could not be read.
    pub fn with_failing_prepare(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.lock().generate_offsets.len()
    }

    pub fn prepare_calls(&self) -> usize {
        self.lock().prepare_calls
    }

    pub fn release_calls(&self) -> usize {
        self.lock().release_calls
    }

    /// Instants at which each `generate` call started.
    pub fn call_offsets(&self) -> Vec<Instant> {
        self.lock().generate_offsets.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    type Prepared = usize;

    async fn prepare(&self, _audio: &Path, keyframes: &[PathBuf]) -> Result<usize> {
        {
            let mut state = self.lock();
            state.prepare_calls += 1;
            if state.prepare_failures > 0 {
                state.prepare_failures -= 1;
                return Err(Error::Analysis("upload returned 503".to_string()));
            }
        }
        if self.fail_prepare {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "audio file missing",
            )));
        }
        Ok(keyframes.len())
    }

    async fn generate(&self, _prepared: &usize) -> Result<String> {
        let mut state = self.lock();
        state.generate_offsets.push(Instant::now());
        match state.script.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(Error::Analysis(msg)),
            None => Err(Error::Analysis("script exhausted".to_string())),
        }
    }

    async fn release(&self, _prepared: usize) -> Result<()> {
        self.lock().release_calls += 1;
        Ok(())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
