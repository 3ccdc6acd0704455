use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the chapter splitter
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Split and verification behaviour
    pub split: SplitConfig,

    /// External tool settings
    pub ffmpeg: FfmpegConfig,

    /// Performance and resource settings
    pub performance: PerformanceConfig,

    /// Logging and report settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Maximum duration drift (seconds) accepted between expected and actual
    pub tolerance_seconds: f64,

    /// Extension of chapter output files
    pub output_extension: String,

    /// What to do after a chapter fails to extract
    pub failure_policy: FailurePolicy,

    /// Run the integrity check right after splitting
    pub verify_after_split: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep extracting the remaining chapters
    Continue,
    /// Stop dispatching chapters after the first failure
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub ffmpeg_path: PathBuf,

    pub ffprobe_path: PathBuf,

    /// Copy streams instead of re-encoding
    pub stream_copy: bool,

    /// Extra output arguments appended before the destination path
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum number of chapters extracted concurrently
    pub max_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Log level
    pub log_level: String,

    /// Write a JSON run report into the output directory
    pub save_report: bool,

    /// File name of the run report
    pub report_file: String,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            tolerance_seconds: 1.0,
            output_extension: crate::plan::DEFAULT_EXTENSION.to_string(),
            failure_policy: FailurePolicy::Continue,
            verify_after_split: true,
        }
    }
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            stream_copy: true,
            extra_args: Vec::new(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            // One ffmpeg process already saturates most machines
            max_workers: 1,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            save_report: true,
            report_file: "split_report.json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let config_paths = ["chapter-splitter.toml", "config/chapter-splitter.toml"];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config.with_env_overrides())
    }

    /// Defaults with environment variable overrides
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(workers) = std::env::var("CHAPTER_SPLITTER_WORKERS") {
            match workers.parse() {
                Ok(workers) => self.performance.max_workers = workers,
                Err(_) => tracing::warn!("Ignoring invalid CHAPTER_SPLITTER_WORKERS={}", workers),
            }
        }

        if let Ok(tolerance) = std::env::var("CHAPTER_SPLITTER_TOLERANCE") {
            match tolerance.parse() {
                Ok(tolerance) => self.split.tolerance_seconds = tolerance,
                Err(_) => tracing::warn!("Ignoring invalid CHAPTER_SPLITTER_TOLERANCE={}", tolerance),
            }
        }

        if let Ok(ffmpeg) = std::env::var("CHAPTER_SPLITTER_FFMPEG") {
            self.ffmpeg.ffmpeg_path = PathBuf::from(ffmpeg);
        }

        if let Ok(ffprobe) = std::env::var("CHAPTER_SPLITTER_FFPROBE") {
            self.ffmpeg.ffprobe_path = PathBuf::from(ffprobe);
        }

        if let Ok(log_level) = std::env::var("CHAPTER_SPLITTER_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.performance.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if !self.split.tolerance_seconds.is_finite() || self.split.tolerance_seconds <= 0.0 {
            return Err(anyhow!(
                "tolerance_seconds must be a positive number, got {}",
                self.split.tolerance_seconds
            ));
        }

        if self.split.output_extension.trim().is_empty() {
            return Err(anyhow!("output_extension must not be empty"));
        }

        if self.output.save_report && self.output.report_file.trim().is_empty() {
            return Err(anyhow!("report_file must be set when save_report is enabled"));
        }

        Ok(())
    }

    /// Worker count actually used: never more than the machine's cores
    pub fn effective_workers(&self) -> usize {
        self.performance.max_workers.clamp(1, num_cpus::get().max(1))
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Chapter Splitter Configuration:\n\
            - Workers: {}\n\
            - Tolerance: {:.2}s\n\
            - Failure Policy: {:?}\n\
            - Stream Copy: {}\n\
            - ffmpeg: {}\n\
            - ffprobe: {}\n\
            - Verify After Split: {}",
            self.effective_workers(),
            self.split.tolerance_seconds,
            self.split.failure_policy,
            self.ffmpeg.stream_copy,
            self.ffmpeg.ffmpeg_path.display(),
            self.ffmpeg.ffprobe_path.display(),
            self.split.verify_after_split
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn with_tolerance(mut self, seconds: f64) -> Self {
        self.config.split.tolerance_seconds = seconds;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.split.failure_policy = policy;
        self
    }

    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.split.output_extension = extension.into();
        self
    }

    pub fn verify_after_split(mut self, enable: bool) -> Self {
        self.config.split.verify_after_split = enable;
        self
    }

    pub fn save_report(mut self, enable: bool) -> Self {
        self.config.output.save_report = enable;
        self
    }

    pub fn with_ffmpeg_paths(mut self, ffmpeg: PathBuf, ffprobe: PathBuf) -> Self {
        self.config.ffmpeg.ffmpeg_path = ffmpeg;
        self.config.ffmpeg.ffprobe_path = ffprobe;
        self
    }

    pub fn stream_copy(mut self, enable: bool) -> Self {
        self.config.ffmpeg.stream_copy = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
