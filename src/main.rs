use anyhow::{Context, Result};
use chapter_splitter::{ChapterSplitter, Config, RunReport, SplitRequest};
use clap::{Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn build_cli() -> Command {
    Command::new("chapter-split")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Split a video into chapters from a timestamp list and verify the result")
        .arg(
            Arg::new("video")
                .short('v')
                .long("video")
                .value_name("FILE")
                .help("Path to the video file (prompted for when omitted)")
        )
        .arg(
            Arg::new("chapters")
                .short('c')
                .long("chapters")
                .value_name("FILE")
                .help("Chapters file, one \"HH:MM:SS Title\" per line (prompted for when omitted)")
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for chapter files (prompted for when omitted)")
        )
        .arg(
            Arg::new("verify-only")
                .long("verify-only")
                .visible_alias("integrity")
                .help("Only check existing chapter files against the video")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Show the split plan without extracting anything")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NUM")
                .help("Number of chapters to extract in parallel")
                .value_parser(clap::value_parser!(usize))
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
}

/// Reads answers for arguments missing from the command line
struct Prompter {
    stdin: BufReader<Stdin>,
}

impl Prompter {
    fn new() -> Self {
        Self {
            stdin: BufReader::new(tokio::io::stdin()),
        }
    }

    async fn ask(&mut self, label: &str) -> Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(label.as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        self.stdin
            .read_line(&mut line)
            .await
            .context("Failed to read from stdin")?;
        Ok(line.trim().to_string())
    }

    async fn path_arg(&mut self, matches: &ArgMatches, name: &str, label: &str) -> Result<PathBuf> {
        match matches.get_one::<String>(name) {
            Some(value) => Ok(PathBuf::from(value)),
            None => Ok(PathBuf::from(self.ask(label).await?)),
        }
    }
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(&PathBuf::from(path))?,
        None => Config::load()?,
    };

    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.performance.max_workers = *workers;
    }

    config.validate()?;
    Ok(config)
}

/// Logging starts at `info` so configuration loading is visible; the
/// configured level is applied once the config is known.
fn init_logging(verbose: bool) -> FilterHandle {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose).with_thread_ids(verbose))
        .init();

    handle
}

/// Filter for the configured log level, unless `--verbose` or `RUST_LOG` take precedence
fn configured_filter(verbose: bool, env_override: bool, level: &str) -> Option<EnvFilter> {
    if verbose || env_override {
        return None;
    }
    match EnvFilter::try_new(level) {
        Ok(filter) => Some(filter),
        Err(e) => {
            warn!("Ignoring invalid log level {:?}: {}", level, e);
            None
        }
    }
}

fn apply_log_level(handle: &FilterHandle, verbose: bool, level: &str) {
    let env_override = std::env::var_os(EnvFilter::DEFAULT_ENV).is_some();
    if let Some(filter) = configured_filter(verbose, env_override, level) {
        if let Err(e) = handle.reload(filter) {
            warn!("Failed to apply log level {:?}: {}", level, e);
        }
    }
}

/// The video is left to the probe, which also understands URLs; the chapters
/// file is read locally and must exist.
fn check_inputs(video: &Path, chapters: &Path) -> Result<()> {
    if !chapters.is_file() {
        anyhow::bail!("Chapters file does not exist: {}", chapters.display());
    }
    if !video.exists() {
        debug!("{} is not a local file, leaving it to the probe", video.display());
    }
    Ok(())
}

fn log_outcome(report: &RunReport) {
    if let Some(execution) = &report.execution {
        info!("✅ Extracted: {}", execution.extracted());
        info!("⏭️  Already present: {}", execution.skipped());
        if execution.failed() > 0 {
            warn!("❌ Failed: {}", execution.failed());
        }
        if execution.cancelled() > 0 {
            warn!("🛑 Cancelled: {}", execution.cancelled());
        }
    }

    if let Some(integrity) = &report.integrity {
        info!(
            "📊 Integrity {}: source {:.2}s, chapters {:.2}s (difference {:+.2}s)",
            integrity.verdict,
            integrity.source_duration,
            integrity.total_chapter_duration,
            integrity.difference()
        );
        for missing in integrity.missing() {
            warn!("   missing: {}", missing.output_path.display());
        }
        for unreadable in integrity.unreadable() {
            warn!("   unreadable: {}", unreadable.output_path.display());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let verbose = matches.get_flag("verbose");
    let log_handle = init_logging(verbose);
    let config = load_config(&matches)?;
    apply_log_level(&log_handle, verbose, &config.output.log_level);

    let mut prompter = Prompter::new();
    let video = prompter.path_arg(&matches, "video", "Location of Video File: ").await?;
    let chapters = prompter.path_arg(&matches, "chapters", "Location of Chapters File: ").await?;
    let output_dir = prompter.path_arg(&matches, "output", "Output Directory: ").await?;

    check_inputs(&video, &chapters)?;

    let request = SplitRequest::new(video, chapters, Some(output_dir));

    info!("🚀 Chapter Splitter starting...");
    info!("🎞️  Video: {}", request.video.display());
    info!("📖 Chapters: {}", request.chapters.display());
    match &request.output_dir {
        Some(dir) => info!("📂 Output directory: {}", dir.display()),
        None => info!("📂 Output directory: current directory"),
    }
    for line in config.summary().lines() {
        debug!("{}", line);
    }

    let splitter = ChapterSplitter::new(config);

    if matches.get_flag("dry-run") {
        let plan = splitter.plan(&request).await?;
        for chapter in plan.iter() {
            let end = chapter
                .range
                .end
                .map(|end| end.to_string())
                .unwrap_or_else(|| "end".to_string());
            info!(
                "{:>3}. {} -> {} ({:.2}s) => {}",
                chapter.index,
                chapter.range.start,
                end,
                plan.expected_duration(chapter),
                chapter.output_path.display()
            );
        }
        info!("🧪 Dry run complete - no files written");
        return Ok(());
    }

    let report = if matches.get_flag("verify-only") {
        splitter.verify(&request).await?
    } else {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("🛑 Interrupted: finishing running chapters, no new ones will start");
                    on_signal.cancel();
                }
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        });

        splitter.split(&request, &cancel).await?
    };

    log_outcome(&report);

    if !report.is_success() {
        warn!("⚠️  The split is incomplete or does not match the source");
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remote_video_is_not_stat_checked() {
        let temp_dir = TempDir::new().unwrap();
        let chapters = temp_dir.path().join("chapters.txt");
        std::fs::write(&chapters, "00:00:00 Intro\n").unwrap();

        assert!(check_inputs(Path::new("https://media.example.com/talk.mp4"), &chapters).is_ok());
        assert!(check_inputs(&temp_dir.path().join("missing.mkv"), &chapters).is_ok());
    }

    #[test]
    fn test_missing_chapters_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let err = check_inputs(Path::new("talk.mp4"), &temp_dir.path().join("nope.txt")).unwrap_err();
        assert!(err.to_string().contains("Chapters file does not exist"));
    }

    #[test]
    fn test_configured_filter_precedence() {
        assert!(configured_filter(false, false, "warn").is_some());
        assert!(configured_filter(true, false, "warn").is_none());
        assert!(configured_filter(false, true, "warn").is_none());
    }
}
