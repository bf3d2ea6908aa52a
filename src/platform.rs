//! Source URL validation and platform classification
//!
//! Classification is a substring match on known domains, not a URL parse.
//! `https://example.com/?next=youtube.com` is accepted as YouTube; callers
//! live with that granularity.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{MediaError, Result};

/// Scheme-optional `host.tld[/path]`. Scheme, host and TLD are ASCII only.
const URL_PATTERN: &str = r"^(?i-u:https?://)?(?-u:[\w.-]+)\.(?i-u:[a-z]{2,})(/\S*)?$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Instagram => "instagram",
        }
    }

    fn domains(&self) -> &'static [&'static str] {
        match self {
            Platform::YouTube => &["youtube.com", "youtu.be"],
            Platform::Instagram => &["instagram.com"],
        }
    }

    /// Platforms that need the cookie file to serve most content.
    pub fn requires_credentials(&self) -> bool {
        matches!(self, Platform::Instagram)
    }

    pub fn all() -> &'static [Platform] {
        &[Platform::YouTube, Platform::Instagram]
    }

    /// Classify a URL by domain substring. `None` means unsupported.
    pub fn detect(url: &str) -> Option<Platform> {
        Platform::all()
            .iter()
            .copied()
            .find(|platform| platform.domains().iter().any(|domain| url.contains(domain)))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static RE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(URL_PATTERN).unwrap());

pub fn is_valid_url(url: &str) -> bool {
    RE_URL.is_match(url)
}

/// Validate a raw caller URL and resolve its platform.
pub fn validate_url(url: &str) -> Result<Platform> {
    if url.is_empty() {
        return Err(MediaError::InvalidInput("URL is required".to_string()));
    }

    // A leading dash would reach the downloader as an option.
    if url.starts_with('-') || !is_valid_url(url) {
        return Err(MediaError::InvalidInput("Invalid URL".to_string()));
    }

    Platform::detect(url).ok_or_else(|| MediaError::UnsupportedPlatform(url.to_string()))
}
