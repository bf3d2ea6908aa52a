//! Scratch directory layout
//!
//! Each request gets a fresh UUID; every file it touches is named after that
//! id, so two requests for identically titled media never share a path.
//! The sanitized title only survives as the display name.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::quality::MediaFormat;
use crate::ytdlp::EXT_PLACEHOLDER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ArtifactId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A file produced for exactly one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchArtifact {
    pub id: ArtifactId,
    pub format: MediaFormat,
    pub path: PathBuf,
    /// Name offered to the client, e.g. `My_Video_toolverse.online.mp4`.
    pub display_name: String,
}

impl ScratchArtifact {
    /// Public file name: `<id>.<ext>`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.format.extension())
    }
}

#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Reserve names for a new artifact. Nothing is created on disk.
    pub fn allocate(&self, title: &str, suffix: &str, format: MediaFormat) -> ScratchArtifact {
        let id = ArtifactId::new();
        let ext = format.extension();
        ScratchArtifact {
            id,
            format,
            path: self.root.join(format!("{id}.{ext}")),
            display_name: format!("{title}{suffix}.{ext}"),
        }
    }

    /// Output template for the downloader; it fills in the extension.
    pub fn output_template(&self, artifact: &ScratchArtifact) -> String {
        self.root
            .join(format!("{}.{}", artifact.id, EXT_PLACEHOLDER))
            .display()
            .to_string()
    }

    /// Side path the transcoder writes before it replaces the artifact.
    pub fn watermark_path(&self, artifact: &ScratchArtifact) -> PathBuf {
        self.root
            .join(format!("{}.watermarked.{}", artifact.id, artifact.format.extension()))
    }

    /// Delete every file belonging to `id`, including downloader leftovers
    /// such as `<id>.mp4.part` or `<id>.f137.mp4`.
    pub async fn purge(&self, id: ArtifactId) -> Result<usize> {
        let prefix = format!("{id}.");
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let owned = entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(&prefix))
                .unwrap_or(false);
            if !owned {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("could not remove {}: {}", entry.path().display(), e),
            }
        }
        Ok(removed)
    }

    /// Delete files left behind by an earlier process whose timers never fired.
    pub async fn remove_stale(&self, older_than: Duration) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_artifact_name(&path) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < older_than {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("removed stale artifact {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("could not remove stale artifact {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            info!("removed {} stale artifacts from {}", removed, self.root.display());
        }
        Ok(removed)
    }
}

/// Split `<uuid>.<ext>` into its id and extension.
pub fn parse_file_name(name: &str) -> Option<(ArtifactId, &str)> {
    let (stem, ext) = name.split_once('.')?;
    let id = stem.parse().ok()?;
    Some((id, ext))
}

/// Only files named after an artifact id are ours to delete.
fn is_artifact_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .map(|stem| stem.parse::<ArtifactId>().is_ok())
        .unwrap_or(false)
}
