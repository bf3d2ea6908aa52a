//! FFmpeg command wrapper utilities

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use crate::tool::{ToolCommand, ToolError};

pub struct FfmpegCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl FfmpegCommand {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn with_program(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Overwrite the output without asking (`-y`).
    pub fn overwrite(mut self) -> Self {
        self.args.push("-y".to_string());
        self
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push("-i".to_string());
        self.args.push(path.as_ref().display().to_string());
        self
    }

    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push(path.as_ref().display().to_string());
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub async fn execute(self) -> Result<Output, ToolError> {
        ToolCommand::new(&self.program)
            .args(self.args)
            .timeout(self.timeout)
            .execute()
            .await
    }
}

impl Default for FfmpegCommand {
    fn default() -> Self {
        Self::new()
    }
}
