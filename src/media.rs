use crate::config::FfmpegConfig;
use crate::error::{Result, SplitError};
use crate::plan::ChapterRange;
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Reports the duration of a media file
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Duration in seconds. Fails with [`SplitError::Probe`] when the file is
    /// unreadable or not a media container.
    async fn duration(&self, path: &Path) -> Result<f64>;
}

/// Copies a time range of a source into a new file
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Write `range` of `source` to `destination`, replacing any existing file.
    /// Fails with [`SplitError::ExtractionFailed`].
    async fn extract(&self, source: &Path, range: &ChapterRange, destination: &Path) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe and extraction backed by the `ffprobe` and `ffmpeg` executables
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    stream_copy: bool,
    extra_args: Vec<String>,
}

impl FfmpegTools {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
            stream_copy: config.stream_copy,
            extra_args: config.extra_args.clone(),
        }
    }

    /// Arguments for one chapter extraction. The seek goes before `-i` so
    /// ffmpeg jumps straight to the start; the length is given with `-t`.
    pub fn extract_args(&self, source: &Path, range: &ChapterRange, destination: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-ss".into(),
            range.start.as_secs().to_string().into(),
            "-i".into(),
            source.as_os_str().to_os_string(),
        ];

        if let Some(end) = range.end {
            let length = end.as_secs().saturating_sub(range.start.as_secs());
            args.push("-t".into());
            args.push(length.to_string().into());
        }

        if self.stream_copy {
            args.push("-c".into());
            args.push("copy".into());
        }

        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(destination.as_os_str().to_os_string());
        args
    }
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::new(&FfmpegConfig::default())
    }
}

#[async_trait]
impl MediaProbe for FfmpegTools {
    async fn duration(&self, path: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-print_format", "json", "-show_format"])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                SplitError::probe(path, format!("cannot run {}: {}", self.ffprobe_path.display(), e))
            })?;

        if !output.status.success() {
            return Err(SplitError::probe(path, last_stderr_line(&output.stderr)));
        }

        parse_ffprobe_duration(&output.stdout).map_err(|reason| SplitError::probe(path, reason))
    }
}

#[async_trait]
impl MediaExtractor for FfmpegTools {
    async fn extract(&self, source: &Path, range: &ChapterRange, destination: &Path) -> Result<()> {
        let args = self.extract_args(source, range, destination);
        debug!("Running {} {:?}", self.ffmpeg_path.display(), args);

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                SplitError::extraction(
                    destination,
                    format!("cannot run {}: {}", self.ffmpeg_path.display(), e),
                )
            })?;

        if !output.status.success() {
            return Err(SplitError::extraction(destination, last_stderr_line(&output.stderr)));
        }

        Ok(())
    }
}

fn parse_ffprobe_duration(stdout: &[u8]) -> std::result::Result<f64, String> {
    let probe: FfprobeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("unreadable ffprobe output: {}", e))?;

    let duration = probe
        .format
        .and_then(|format| format.duration)
        .ok_or_else(|| "container does not report a duration".to_string())?;

    match duration.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        _ => Err(format!("invalid duration {:?}", duration)),
    }
}

fn last_stderr_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "tool exited with an error".to_string())
}
