//! External command runner shared by the downloader and transcoder wrappers
//!
//! Tools are spawned with an explicit argument vector (never through a shell)
//! and killed when their future is dropped, so a timeout also reaps the child.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} not found in system PATH")]
    NotInstalled(String),

    #[error("{program} exited with {status}: {stderr}")]
    ExecutionFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Run to completion and hand back the output whatever the exit status.
    pub async fn output(self) -> Result<Output, ToolError> {
        let name = self.display_name();
        debug!("exec: {} {}", name, self.args.join(" "));

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child).await.map_err(|_| {
                ToolError::TimedOut {
                    program: name.clone(),
                    timeout: limit,
                }
            })?,
            None => child.await,
        };

        result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotInstalled(name)
            } else {
                ToolError::Io(e)
            }
        })
    }

    /// Run to completion; a non-zero exit becomes `ExecutionFailed`.
    pub async fn execute(self) -> Result<Output, ToolError> {
        let name = self.display_name();
        let output = self.output().await?;

        if !output.status.success() {
            return Err(ToolError::ExecutionFailed {
                program: name,
                status: output.status.to_string(),
                stderr: last_line(&output.stderr),
            });
        }

        Ok(output)
    }

    fn display_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or_else(|| OsStr::new("tool"))
            .to_string_lossy()
            .into_owned()
    }
}

/// Last non-empty line of a tool's stderr, which is where both yt-dlp and
/// ffmpeg put the actual error.
pub fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or_default()
        .to_string()
}

/// Whether `program --version` can be spawned at all.
pub async fn tool_available(program: impl AsRef<Path>) -> bool {
    ToolCommand::new(program)
        .arg("--version")
        .timeout(Some(Duration::from_secs(10)))
        .output()
        .await
        .is_ok()
}
