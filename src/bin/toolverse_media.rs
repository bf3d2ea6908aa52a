// toolverse_media - HTTP daemon
// Social media fetch (yt-dlp + ffmpeg watermark) and image conversion

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use toolverse_media::tool::tool_available;
use toolverse_media::{
    create_router, AppState, ArtifactRegistry, DownloadPipeline, FailureMode, Metrics,
    ScratchDir, ServiceConfig, StepPolicy, ToolPaths, WatermarkConfig,
};

#[derive(Parser)]
#[command(name = "toolverse_media", version, about = "Toolverse media daemon - social downloads and image conversion")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Directory for in-flight and downloadable artifacts
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Cookie file used for credential-gated platforms
    #[arg(long, default_value = "cookies.txt")]
    cookies: PathBuf,

    /// yt-dlp binary
    #[arg(long, default_value = "yt-dlp")]
    ytdlp_bin: PathBuf,

    /// ffmpeg binary
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg_bin: PathBuf,

    /// Seconds an artifact stays downloadable
    #[arg(long, default_value_t = 180)]
    artifact_ttl_secs: u64,

    /// Seconds between expiry sweeps
    #[arg(long, default_value_t = 15)]
    sweep_interval_secs: u64,

    /// Seconds allowed for the title probe
    #[arg(long, default_value_t = 30)]
    probe_timeout_secs: u64,

    /// Seconds allowed for a fetch (0 = unbounded)
    #[arg(long, default_value_t = 600)]
    fetch_timeout_secs: u64,

    /// Seconds allowed for the watermark pass (0 = unbounded)
    #[arg(long, default_value_t = 600)]
    transcode_timeout_secs: u64,

    /// Text burned into downloaded videos
    #[arg(long, default_value = "ToolVerse")]
    watermark_text: String,

    /// Fail the request when the watermark pass fails instead of delivering the unmarked file
    #[arg(long, default_value_t = false)]
    require_watermark: bool,

    /// Fail the request when the title probe fails instead of using "Untitled"
    #[arg(long, default_value_t = false)]
    require_title: bool,

    /// Base URL used in returned artifact links. When unset, links are built as
    /// `http://<Host header>`, which the caller controls; set this behind a
    /// proxy or TLS terminator.
    #[arg(long)]
    public_base_url: Option<String>,
}

impl Args {
    fn into_config(self) -> ServiceConfig {
        let defaults = ServiceConfig::default();
        let bounded = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
        let mode = |required: bool| {
            if required {
                FailureMode::Required
            } else {
                FailureMode::BestEffort
            }
        };

        ServiceConfig {
            scratch_dir: self.scratch_dir.unwrap_or(defaults.scratch_dir),
            cookies_path: self.cookies,
            tools: ToolPaths {
                ytdlp: self.ytdlp_bin,
                ffmpeg: self.ffmpeg_bin,
            },
            watermark: WatermarkConfig {
                text: self.watermark_text,
                ..WatermarkConfig::default()
            },
            policy: StepPolicy {
                probe: mode(self.require_title),
                watermark: mode(self.require_watermark),
            },
            artifact_ttl: Duration::from_secs(self.artifact_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            fetch_timeout: bounded(self.fetch_timeout_secs),
            transcode_timeout: bounded(self.transcode_timeout_secs),
            public_base_url: self.public_base_url,
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let args = Args::parse();
    let bind = args.bind.clone();
    let config = Arc::new(args.into_config());

    info!("Starting toolverse_media");
    info!("   Scratch: {}", config.scratch_dir.display());
    info!("   Artifact TTL: {:?}", config.artifact_ttl);
    if config.public_base_url.is_none() {
        warn!("--public-base-url not set; artifact links use http:// and the request Host header");
    }

    for tool in [&config.tools.ytdlp, &config.tools.ffmpeg] {
        if tool_available(tool).await {
            info!("   ✓ {} available", tool.display());
        } else {
            warn!("{} is not runnable; requests that need it will fail", tool.display());
        }
    }

    let scratch = ScratchDir::new(config.scratch_dir.clone());
    scratch.ensure().await.context("Failed to create scratch directory")?;
    scratch
        .remove_stale(config.artifact_ttl)
        .await
        .context("Failed to clean scratch directory")?;

    let metrics = Metrics::new();
    let registry = ArtifactRegistry::new(Arc::clone(&metrics));
    let sweeper = registry.spawn_sweeper(config.sweep_interval);

    let pipeline = DownloadPipeline::new(Arc::clone(&config), registry, Arc::clone(&metrics));
    let app = create_router(AppState::new(pipeline, metrics));

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    info!("   ✓ Listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    sweeper.abort();
    info!("toolverse_media stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_match_service_defaults() {
        let config = Args::parse_from(["toolverse_media"]).into_config();
        assert_eq!(config.artifact_ttl, Duration::from_secs(180));
        assert_eq!(config.policy, StepPolicy::default());
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.watermark.text, "ToolVerse");
    }

    #[test]
    fn test_flags_override() {
        let config = Args::parse_from([
            "toolverse_media",
            "--require-watermark",
            "--fetch-timeout-secs",
            "0",
            "--scratch-dir",
            "/srv/scratch",
        ])
        .into_config();
        assert_eq!(config.policy.watermark, FailureMode::Required);
        assert_eq!(config.fetch_timeout, None);
        assert_eq!(config.scratch_dir, PathBuf::from("/srv/scratch"));
    }
}
