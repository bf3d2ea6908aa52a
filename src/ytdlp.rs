//! yt-dlp command builder and title probe

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use tracing::debug;

use crate::error::{MediaError, Result};
use crate::tool::{ToolCommand, ToolError};

/// Title used whenever the probe cannot produce one.
pub const FALLBACK_TITLE: &str = "Untitled";

/// Placeholder yt-dlp resolves to the real extension.
pub const EXT_PLACEHOLDER: &str = "%(ext)s";

pub struct YtDlpCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl YtDlpCommand {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            timeout: None,
        }
    }

    fn push(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Print the title only; nothing is downloaded.
    pub fn get_title(self) -> Self {
        self.push(&["--get-title"])
    }

    /// `-x --audio-format mp3 --audio-quality <kbps>K`
    pub fn extract_audio(self, bitrate_kbps: &str) -> Self {
        let quality = format!("{bitrate_kbps}K");
        self.push(&["-x", "--audio-format", "mp3", "--audio-quality", &quality])
    }

    /// `-f <selector> --merge-output-format mp4`
    pub fn video_format(self, selector: &str) -> Self {
        self.push(&["-f", selector, "--merge-output-format", "mp4"])
    }

    pub fn cookies(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().display().to_string();
        self.push(&["--cookies", &path])
    }

    pub fn output_template(self, template: &str) -> Self {
        self.push(&["-o", template])
    }

    /// Positional URL after `--`; everything pushed later is also positional,
    /// so this goes last.
    pub fn url(self, url: &str) -> Self {
        self.push(&["--", url])
    }

    pub fn no_check_certificates(self) -> Self {
        self.push(&["--no-check-certificates"])
    }

    pub fn force_overwrites(self) -> Self {
        self.push(&["--force-overwrites"])
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    fn into_command(self) -> ToolCommand {
        ToolCommand::new(self.program)
            .args(self.args)
            .timeout(self.timeout)
    }

    pub async fn output(self) -> std::result::Result<Output, ToolError> {
        self.into_command().output().await
    }

    pub async fn execute(self) -> std::result::Result<Output, ToolError> {
        self.into_command().execute().await
    }
}

/// Reduce a remote title to a filesystem-safe token.
///
/// Keeps ASCII alphanumerics, `_` and `-`; runs of whitespace become a single
/// `_`; everything else is dropped.
pub fn sanitize_title(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Ask yt-dlp for the resource title, bounded by `timeout`.
pub async fn probe_title(program: impl AsRef<Path>, url: &str, timeout: Duration) -> Result<String> {
    let output = YtDlpCommand::new(program)
        .get_title()
        .url(url)
        .timeout(Some(timeout))
        .execute()
        .await
        .map_err(|e| MediaError::ProbeFailed(e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let raw = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| MediaError::ProbeFailed("empty title output".to_string()))?;

    let title = sanitize_title(raw);
    if title.is_empty() {
        return Err(MediaError::ProbeFailed(format!("title {raw:?} sanitized to nothing")));
    }

    debug!("probed title: {}", title);
    Ok(title)
}
