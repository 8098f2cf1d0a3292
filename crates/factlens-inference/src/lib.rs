//! # factlens-inference
//!
//! Multimodal analysis backends for factlens.
//!
//! This crate provides:
//! - The single-attempt [`AnalysisBackend`] abstraction
//! - A Gemini implementation with inline and Files API input strategies
//! - [`RetryingAnalyzer`], the [`factlens_core::AnalysisClient`] the pipeline
//!   uses, with exponential backoff and response parsing
//!
//! # Feature Flags
//!
//! - `mock`: Enable the scripted backend for tests in dependent crates
//!
//! # Example
//!
//! ```rust,no_run
//! use factlens_inference::{GeminiBackend, GeminiConfig, RetryPolicy, RetryingAnalyzer};
//!
//! # fn build() -> factlens_core::Result<()> {
//! let backend = GeminiBackend::new(GeminiConfig::from_env()?)?;
//! let analyzer = RetryingAnalyzer::new(backend, RetryPolicy::from_env());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod gemini;
pub mod parse;
pub mod prompt;
pub mod retry;

// Scripted backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use backend::{mime_type_for, AnalysisBackend};
pub use gemini::{GeminiBackend, GeminiConfig, GeminiInput, InputStrategy};
pub use parse::{parse_analysis, strip_fences};
pub use prompt::ANALYSIS_PROMPT;
pub use retry::{RetryPolicy, RetryingAnalyzer};
