//! # factlens-core
//!
//! Core types, traits, and abstractions for factlens.
//!
//! This crate provides the data model shared by the pipeline, the store and
//! the HTTP surface, plus the collaborator traits the pipeline runner is
//! generic over.

pub mod defaults;
pub mod error;
pub mod models;
pub mod platform;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use platform::{cache_key, detect_platform, normalize_url, validate_url, Platform};
pub use traits::*;
