//! Media fetch via yt-dlp
//!
//! The exit status of yt-dlp is advisory. It exits non-zero for warnings that
//! still leave a usable file, and zero in cases where post-processing silently
//! failed, so the presence of the expected output file is what decides success.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::{MediaError, Result};
use crate::platform::{validate_url, Platform};
use crate::quality::{audio_bitrate, video_selector, MediaFormat, QualityTier};
use crate::scratch::{ScratchArtifact, ScratchDir};
use crate::tool::last_line;
use crate::ytdlp::YtDlpCommand;

/// A validated download request. Construction is the only validation point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    platform: Platform,
    format: MediaFormat,
    quality: Option<QualityTier>,
}

impl DownloadRequest {
    pub fn new(url: &str, format: &str, quality: &str) -> Result<Self> {
        let url = url.trim();
        let platform = validate_url(url)?;
        Ok(Self {
            url: url.to_string(),
            platform,
            format: MediaFormat::parse(format),
            quality: QualityTier::parse(quality),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    /// `None` when the caller sent a tier we do not know.
    pub fn quality(&self) -> Option<QualityTier> {
        self.quality
    }
}

/// Cookie file to pass for `platform`, if it needs one and one is present.
pub async fn resolve_credentials(cookies_path: &Path, platform: Platform) -> Option<PathBuf> {
    if !platform.requires_credentials() {
        return None;
    }

    match tokio::fs::try_exists(cookies_path).await {
        Ok(true) => Some(cookies_path.to_path_buf()),
        _ => {
            debug!(
                "no cookie file at {}, fetching {} without credentials",
                cookies_path.display(),
                platform
            );
            None
        }
    }
}

/// Assemble the full yt-dlp invocation for one request.
pub fn build_fetch_command(
    program: &Path,
    request: &DownloadRequest,
    output_template: &str,
    cookies: Option<&Path>,
) -> YtDlpCommand {
    let mut cmd = YtDlpCommand::new(program);

    cmd = match request.format() {
        MediaFormat::Audio => cmd.extract_audio(audio_bitrate(request.quality())),
        MediaFormat::Video => cmd.video_format(video_selector(request.quality())),
    };

    if let Some(cookies) = cookies {
        cmd = cmd.cookies(cookies);
    }

    cmd.output_template(output_template)
        .no_check_certificates()
        .force_overwrites()
        .url(request.url())
}

/// Download `request` into `artifact.path`.
pub async fn fetch(
    config: &ServiceConfig,
    scratch: &ScratchDir,
    request: &DownloadRequest,
    artifact: &ScratchArtifact,
) -> Result<()> {
    let cookies = resolve_credentials(&config.cookies_path, request.platform()).await;
    let template = scratch.output_template(artifact);
    let cmd = build_fetch_command(&config.tools.ytdlp, request, &template, cookies.as_deref())
        .timeout(config.fetch_timeout);

    info!("fetching {} ({:?}) into {}", request.url(), request.format(), artifact.path.display());
    debug!("yt-dlp args: {:?}", cmd.arguments());

    match cmd.output().await {
        Ok(output) if output.status.success() => {
            debug!("yt-dlp finished: {}", last_line(&output.stdout));
        }
        Ok(output) => {
            warn!("yt-dlp exited with {}: {}", output.status, last_line(&output.stderr));
        }
        Err(e) => {
            warn!("yt-dlp did not run to completion: {}", e);
        }
    }

    if !tokio::fs::try_exists(&artifact.path).await.unwrap_or(false) {
        return Err(MediaError::FetchFailed(
            "Download failed - file not created".to_string(),
        ));
    }

    Ok(())
}
