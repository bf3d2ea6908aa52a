//! Text watermark overlay for fetched videos

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::WatermarkConfig;
use crate::error::{MediaError, Result};
use crate::ffmpeg::FfmpegCommand;

/// `drawtext` filter for `config`.
///
/// The text is escaped twice: once for the option parser (`\`, `'`, `:`)
/// and once for the filtergraph, where it is single-quoted and each quote is
/// written as `'\''`.
pub fn drawtext_filter(config: &WatermarkConfig) -> String {
    let mut option_value = String::with_capacity(config.text.len());
    for c in config.text.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_value.push('\\');
        }
        option_value.push(c);
    }
    let quoted = option_value.replace('\'', r"'\''");
    format!(
        "drawtext=text='{}':fontcolor={}:fontsize={}:x={}:y={}",
        quoted, config.font_color, config.font_size, config.x, config.y
    )
}

pub fn build_watermark_command(
    program: &Path,
    config: &WatermarkConfig,
    input: &Path,
    output: &Path,
) -> FfmpegCommand {
    let filter = drawtext_filter(config);
    FfmpegCommand::with_program(program)
        .overwrite()
        .input(input)
        .args(&["-vf", &filter, "-codec:a", "copy"])
        .output(output)
}

/// Burn the watermark into `artifact`, replacing it in place.
///
/// The transcoder writes to `staging`; only a completed output is renamed over
/// the original. On failure the original is untouched and `staging` removed.
pub async fn apply_watermark(
    program: &Path,
    config: &WatermarkConfig,
    artifact: &Path,
    staging: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    let result = build_watermark_command(program, config, artifact, staging)
        .timeout(timeout)
        .execute()
        .await;

    if let Err(e) = result {
        discard(staging).await;
        return Err(MediaError::WatermarkFailed(e.to_string()));
    }

    if !tokio::fs::try_exists(staging).await.unwrap_or(false) {
        return Err(MediaError::WatermarkFailed(
            "transcoder produced no output".to_string(),
        ));
    }

    // rename(2) replaces the destination atomically.
    if let Err(e) = tokio::fs::rename(staging, artifact).await {
        discard(staging).await;
        return Err(MediaError::WatermarkFailed(format!(
            "could not replace {}: {}",
            artifact.display(),
            e
        )));
    }

    info!("watermarked {}", artifact.display());
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("could not remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_default_filter() {
        assert_eq!(
            drawtext_filter(&WatermarkConfig::default()),
            "drawtext=text='ToolVerse':fontcolor=white:fontsize=24:x=10:y=10"
        );
    }

    #[test]
    fn test_filter_escapes_text() {
        let config = WatermarkConfig {
            text: "it's 10:30".to_string(),
            ..WatermarkConfig::default()
        };
        assert!(drawtext_filter(&config).starts_with(r"drawtext=text='it\'\''s 10\:30':"));

        let config = WatermarkConfig {
            text: r"a\b".to_string(),
            ..WatermarkConfig::default()
        };
        assert!(drawtext_filter(&config).starts_with(r"drawtext=text='a\\b':"));
    }

    #[test]
    fn test_command_copies_audio() {
        let cmd = build_watermark_command(
            Path::new("ffmpeg"),
            &WatermarkConfig::default(),
            Path::new("/tmp/a.mp4"),
            Path::new("/tmp/a.watermarked.mp4"),
        );
        let args = cmd.arguments();
        assert_eq!(args[0], "-y");
        assert_eq!(&args[1..3], &["-i", "/tmp/a.mp4"]);
        assert_eq!(&args[5..7], &["-codec:a", "copy"]);
        assert_eq!(args.last().unwrap(), "/tmp/a.watermarked.mp4");
    }

    #[tokio::test]
    async fn test_failure_leaves_original() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("a.mp4");
        let staging = dir.path().join("a.watermarked.mp4");
        std::fs::write(&artifact, b"original").unwrap();

        let err = apply_watermark(
            &PathBuf::from("/nonexistent/ffmpeg"),
            &WatermarkConfig::default(),
            &artifact,
            &staging,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::WatermarkFailed(_)));
        assert_eq!(std::fs::read(&artifact).unwrap(), b"original");
        assert!(!staging.exists());
    }
}
