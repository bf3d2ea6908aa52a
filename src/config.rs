//! Service configuration
//!
//! Every field has a default matching the values the download route has
//! always used; the daemon overrides them from its command line.

use std::path::PathBuf;
use std::time::Duration;

use crate::policy::StepPolicy;

/// Paths (or bare names resolved through `PATH`) of the external tools.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub ytdlp: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ytdlp: PathBuf::from("yt-dlp"),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatermarkConfig {
    pub text: String,
    pub font_color: String,
    pub font_size: u32,
    pub x: u32,
    pub y: u32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: "ToolVerse".to_string(),
            font_color: "white".to_string(),
            font_size: 24,
            x: 10,
            y: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub scratch_dir: PathBuf,
    /// Cookie file handed to the downloader for credential-gated platforms.
    pub cookies_path: PathBuf,
    pub tools: ToolPaths,
    pub watermark: WatermarkConfig,
    pub policy: StepPolicy,
    /// How long an artifact stays downloadable.
    pub artifact_ttl: Duration,
    pub sweep_interval: Duration,
    pub probe_timeout: Duration,
    pub fetch_timeout: Option<Duration>,
    pub transcode_timeout: Option<Duration>,
    /// Suffix appended to the sanitized title in display names.
    pub brand_suffix: String,
    /// Base for returned artifact URLs; the request `Host` is used when unset.
    pub public_base_url: Option<String>,
}

pub const DEFAULT_ARTIFACT_TTL: Duration = Duration::from_secs(3 * 60);

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("toolverse"),
            cookies_path: PathBuf::from("cookies.txt"),
            tools: ToolPaths::default(),
            watermark: WatermarkConfig::default(),
            policy: StepPolicy::default(),
            artifact_ttl: DEFAULT_ARTIFACT_TTL,
            sweep_interval: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(30),
            fetch_timeout: Some(Duration::from_secs(10 * 60)),
            transcode_timeout: Some(Duration::from_secs(10 * 60)),
            brand_suffix: "_toolverse.online".to_string(),
            public_base_url: None,
        }
    }
}
