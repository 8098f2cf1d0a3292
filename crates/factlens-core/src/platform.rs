//! Source platform classification and result-store keys for submitted URLs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{Error, Result};

/// Social platform a video URL points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Platform {
    Youtube,
    Instagram,
    Tiktok,
    Twitter,
    Facebook,
    Reddit,
    #[default]
    Other,
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "youtube" => Platform::Youtube,
            "instagram" => Platform::Instagram,
            "tiktok" => Platform::Tiktok,
            "twitter" => Platform::Twitter,
            "facebook" => Platform::Facebook,
            "reddit" => Platform::Reddit,
            _ => Platform::Other,
        }
    }
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Reddit => "reddit",
            Platform::Other => "other",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known domains and the platform they belong to.
const PLATFORM_DOMAINS: &[(&str, Platform)] = &[
    ("youtube.com", Platform::Youtube),
    ("youtu.be", Platform::Youtube),
    ("instagram.com", Platform::Instagram),
    ("tiktok.com", Platform::Tiktok),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
    ("facebook.com", Platform::Facebook),
    ("fb.watch", Platform::Facebook),
    ("reddit.com", Platform::Reddit),
];

/// Classify a URL by its hostname.
///
/// The longest domain that equals the host or is a dot-delimited suffix of it
/// wins, so `m.youtube.com` is YouTube but `netflix.com` is not `x.com`.
/// Malformed URLs classify as [`Platform::Other`].
pub fn detect_platform(url: &str) -> Platform {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return Platform::Other;
    };
    let Some(host) = parsed.host_str() else {
        return Platform::Other;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    PLATFORM_DOMAINS
        .iter()
        .filter(|(domain, _)| {
            host == *domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
        .max_by_key(|(domain, _)| domain.len())
        .map(|(_, platform)| *platform)
        .unwrap_or(Platform::Other)
}

/// Check that a submitted URL is something the acquirer can fetch.
///
/// Rejects empty input, unparseable URLs, non-HTTP schemes and URLs
/// without a host.
pub fn validate_url(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("url must not be empty".to_string()));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|e| Error::InvalidInput(format!("Invalid url '{}': {}", trimmed, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "Unsupported url scheme '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidInput("url has no host".to_string()));
    }
    Ok(parsed)
}

/// Canonical form of a submitted URL.
///
/// Whitespace is trimmed and, when the URL parses, scheme and host casing and
/// default ports are normalized by re-serializing it. Path and query are kept
/// verbatim since they identify the video.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Result-store lookup key: hex SHA-256 of the normalized URL.
pub fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(url).as_bytes());
    hex::encode(hasher.finalize())
}
