//! Output format and quality tier lookup
//!
//! Caller strings are mapped onto enums here and nowhere else; only the
//! selector strings below ever reach the downloader's argument vector.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Audio,
    Video,
}

impl MediaFormat {
    /// `"mp3"` (or `"audio"`) selects audio; anything else is a video request.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "mp3" | "audio" => MediaFormat::Audio,
            _ => MediaFormat::Video,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Audio => "mp3",
            MediaFormat::Video => "mp4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Highest,
    High,
    Medium,
    Low,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [
        QualityTier::Highest,
        QualityTier::High,
        QualityTier::Medium,
        QualityTier::Low,
    ];

    /// Unknown tiers yield `None`; lookups then fall back to their default.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "highest" => Some(QualityTier::Highest),
            "high" => Some(QualityTier::High),
            "medium" => Some(QualityTier::Medium),
            "low" => Some(QualityTier::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Highest => "highest",
            QualityTier::High => "high",
            QualityTier::Medium => "medium",
            QualityTier::Low => "low",
        }
    }
}

pub const DEFAULT_AUDIO_BITRATE: &str = "192";
pub const DEFAULT_VIDEO_TIER: QualityTier = QualityTier::High;

/// Audio bitrate in kbps for `--audio-quality`.
pub fn audio_bitrate(tier: Option<QualityTier>) -> &'static str {
    match tier {
        Some(QualityTier::Highest) => "320",
        Some(QualityTier::High) => "256",
        Some(QualityTier::Medium) => "192",
        Some(QualityTier::Low) => "128",
        None => DEFAULT_AUDIO_BITRATE,
    }
}

/// yt-dlp `-f` selector: mp4 video under a height ceiling plus m4a audio.
pub fn video_selector(tier: Option<QualityTier>) -> &'static str {
    match tier.unwrap_or(DEFAULT_VIDEO_TIER) {
        QualityTier::Highest => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best",
        QualityTier::High => "bestvideo[height<=720][ext=mp4]+bestaudio[ext=m4a]/best",
        QualityTier::Medium => "bestvideo[height<=480][ext=mp4]+bestaudio[ext=m4a]/best",
        QualityTier::Low => "bestvideo[height<=360][ext=mp4]+bestaudio[ext=m4a]/best",
    }
}

/// Human label shown next to a tier in the download form.
pub fn label(format: MediaFormat, tier: QualityTier) -> &'static str {
    match (format, tier) {
        (MediaFormat::Video, QualityTier::Highest) => "1080p (Best Quality)",
        (MediaFormat::Video, QualityTier::High) => "720p (HD)",
        (MediaFormat::Video, QualityTier::Medium) => "480p (SD)",
        (MediaFormat::Video, QualityTier::Low) => "360p (Low)",
        (MediaFormat::Audio, QualityTier::Highest) => "320kbps (Best Quality)",
        (MediaFormat::Audio, QualityTier::High) => "256kbps (High)",
        (MediaFormat::Audio, QualityTier::Medium) => "192kbps (Medium)",
        (MediaFormat::Audio, QualityTier::Low) => "128kbps (Low)",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityOption {
    pub value: &'static str,
    pub label: &'static str,
}

pub fn options(format: MediaFormat) -> Vec<QualityOption> {
    QualityTier::ALL
        .iter()
        .map(|tier| QualityOption {
            value: tier.as_str(),
            label: label(format, *tier),
        })
        .collect()
}
