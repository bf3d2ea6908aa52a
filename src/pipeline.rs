//! Download pipeline: validate, probe, fetch, watermark, schedule deletion
//!
//! Stages run strictly in order inside the calling task; each external tool
//! is attempted exactly once. Which failures abort the request is decided by
//! the [`StepPolicy`](crate::policy::StepPolicy) table, not by the stages.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{MediaError, Result};
use crate::fetch::{fetch, DownloadRequest};
use crate::metrics::Metrics;
use crate::policy::Step;
use crate::quality::MediaFormat;
use crate::reaper::ArtifactRegistry;
use crate::scratch::{ScratchArtifact, ScratchDir};
use crate::watermark::apply_watermark;
use crate::ytdlp::{probe_title, FALLBACK_TITLE};

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub artifact: ScratchArtifact,
    /// Sanitized title, or the fallback when probing failed.
    pub title: String,
    pub watermarked: bool,
    /// Time left before the artifact is deleted.
    pub expires_in: Duration,
}

#[derive(Clone)]
pub struct DownloadPipeline {
    config: Arc<ServiceConfig>,
    scratch: ScratchDir,
    registry: ArtifactRegistry,
    metrics: Arc<Metrics>,
}

impl DownloadPipeline {
    pub fn new(config: Arc<ServiceConfig>, registry: ArtifactRegistry, metrics: Arc<Metrics>) -> Self {
        let scratch = ScratchDir::new(config.scratch_dir.clone());
        Self {
            config,
            scratch,
            registry,
            metrics,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    pub async fn run(&self, request: &DownloadRequest) -> Result<DownloadOutcome> {
        info!(
            "download: {} platform={} format={:?} quality={:?}",
            request.url(),
            request.platform(),
            request.format(),
            request.quality()
        );

        let title = self.probe(request).await?;
        let artifact = self.scratch.allocate(&title, &self.config.brand_suffix, request.format());

        self.scratch.ensure().await?;

        if let Err(e) = fetch(&self.config, &self.scratch, request, &artifact).await {
            error!("fetch of {} failed: {}", request.url(), e);
            self.discard(&artifact).await;
            return Err(e);
        }

        let watermarked = match request.format() {
            MediaFormat::Video => self.watermark(&artifact).await?,
            MediaFormat::Audio => false,
        };

        let pending = self
            .registry
            .register(artifact.clone(), self.config.artifact_ttl)
            .await;

        Ok(DownloadOutcome {
            artifact,
            title,
            watermarked,
            expires_in: pending.remaining(Instant::now()),
        })
    }

    async fn probe(&self, request: &DownloadRequest) -> Result<String> {
        match probe_title(&self.config.tools.ytdlp, request.url(), self.config.probe_timeout).await {
            Ok(title) => Ok(title),
            Err(e) if self.config.policy.is_required(Step::Probe) => Err(e),
            Err(e) => {
                warn!("{} step degraded, using {:?}: {}", Step::Probe, FALLBACK_TITLE, e);
                self.metrics.record_probe_fallback();
                Ok(FALLBACK_TITLE.to_string())
            }
        }
    }

    /// Returns whether the delivered file carries the watermark.
    async fn watermark(&self, artifact: &ScratchArtifact) -> Result<bool> {
        let staging = self.scratch.watermark_path(artifact);
        let result = apply_watermark(
            &self.config.tools.ffmpeg,
            &self.config.watermark,
            &artifact.path,
            &staging,
            self.config.transcode_timeout,
        )
        .await;

        match result {
            Ok(()) => Ok(true),
            Err(e) if self.config.policy.is_required(Step::Watermark) => {
                error!("{} step failed for {}: {}", Step::Watermark, artifact.id, e);
                self.discard(artifact).await;
                Err(e)
            }
            Err(e) => {
                warn!("{} step degraded, delivering {} unmarked: {}", Step::Watermark, artifact.id, e);
                self.metrics.record_watermark_skipped();
                Ok(false)
            }
        }
    }

    async fn discard(&self, artifact: &ScratchArtifact) {
        if let Err(e) = self.scratch.purge(artifact.id).await {
            warn!("could not clean up {}: {}", artifact.id, e);
        }
    }
}

/// Errors that should be shown to the caller verbatim.
pub fn public_message(error: &MediaError) -> String {
    match error {
        MediaError::InvalidInput(message) => message.clone(),
        MediaError::UnsupportedPlatform(_) => "Unsupported platform".to_string(),
        _ => "Failed to process download. Please try again.".to_string(),
    }
}
