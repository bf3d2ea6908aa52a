//! toolverse_media - social media fetch and image conversion service
//!
//! Media is fetched by shelling out to `yt-dlp` and watermarked with `ffmpeg`
//! (no linking, argument vectors only). Images are converted in-process.
//! Every fetched file lives in a scratch directory under a per-request id and
//! is deleted by a background sweep once its download window closes.

pub mod config;
pub mod error;
pub mod fetch;
pub mod ffmpeg;
pub mod image;
pub mod metrics;
pub mod pipeline;
pub mod platform;
pub mod policy;
pub mod quality;
pub mod reaper;
pub mod scratch;
pub mod server;
pub mod tool;
pub mod watermark;
pub mod ytdlp;

pub use config::{ServiceConfig, ToolPaths, WatermarkConfig};
pub use error::{MediaError, Result};
pub use fetch::DownloadRequest;
pub use metrics::Metrics;
pub use pipeline::{DownloadOutcome, DownloadPipeline};
pub use platform::Platform;
pub use policy::{FailureMode, Step, StepPolicy};
pub use quality::{MediaFormat, QualityTier};
pub use reaper::ArtifactRegistry;
pub use scratch::{ArtifactId, ScratchArtifact, ScratchDir};
pub use server::{create_router, AppState};
pub use tool::{ToolCommand, ToolError};
