use crate::chapters::{ChapterEntry, ChapterListParser};
use crate::config::Config;
use crate::error::Result;
use crate::executor::{ExecutionReport, SplitExecutor};
use crate::media::{FfmpegTools, MediaExtractor, MediaProbe};
use crate::plan::{SplitPlan, SplitPlanner};
use crate::verify::{IntegrityReport, IntegrityVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Inputs of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRequest {
    pub video: PathBuf,
    pub chapters: PathBuf,
    /// `None` writes chapter files into the working directory
    pub output_dir: Option<PathBuf>,
}

impl SplitRequest {
    pub fn new(video: impl Into<PathBuf>, chapters: impl Into<PathBuf>, output_dir: Option<PathBuf>) -> Self {
        Self {
            video: video.into(),
            chapters: chapters.into(),
            output_dir: output_dir.filter(|dir| !dir.as_os_str().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Split,
    VerifyOnly,
}

/// Stages of a run, in the order they complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Start,
    Parsed,
    Planned,
    Executed,
    Verified,
}

/// Everything that happened during one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub request: SplitRequest,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source_duration: f64,
    pub plan_issues: Vec<String>,
    pub stages_completed: Vec<RunStage>,
    pub execution: Option<ExecutionReport>,
    pub integrity: Option<IntegrityReport>,
}

impl RunReport {
    /// No chapter failed or was cancelled, and the integrity check (if run) passed
    pub fn is_success(&self) -> bool {
        self.execution.as_ref().map_or(true, ExecutionReport::is_success)
            && self.integrity.as_ref().map_or(true, IntegrityReport::passed)
    }
}

/// Parsed chapters and probed source, fixed for the lifetime of a run
struct PreparedRun {
    entries: Vec<ChapterEntry>,
    source_duration: f64,
}

/// Drives a run: parse, plan, split, verify
pub struct ChapterSplitter {
    config: Config,
    parser: ChapterListParser,
    probe: Arc<dyn MediaProbe>,
    extractor: Arc<dyn MediaExtractor>,
}

impl ChapterSplitter {
    /// Use ffmpeg/ffprobe as configured
    pub fn new(config: Config) -> Self {
        let tools = Arc::new(FfmpegTools::new(&config.ffmpeg));
        Self::with_tools(config, tools.clone(), tools)
    }

    pub fn with_tools(config: Config, probe: Arc<dyn MediaProbe>, extractor: Arc<dyn MediaExtractor>) -> Self {
        Self {
            config,
            parser: ChapterListParser::new(),
            probe,
            extractor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn planner(&self, request: &SplitRequest) -> SplitPlanner {
        SplitPlanner::new(request.output_dir.clone()).with_extension(self.config.split.output_extension.clone())
    }

    async fn prepare(&self, request: &SplitRequest) -> Result<PreparedRun> {
        let entries = self.parser.parse_file(&request.chapters).await?;
        if entries.is_empty() {
            warn!("⚠️ No chapters found in {}", request.chapters.display());
        }

        let source_duration = self.probe.duration(&request.video).await?;
        info!("🎞️  Source {} is {:.2}s long", request.video.display(), source_duration);

        Ok(PreparedRun {
            entries,
            source_duration,
        })
    }

    fn build_plan(&self, request: &SplitRequest, prepared: &PreparedRun) -> Result<SplitPlan> {
        let plan = self
            .planner(request)
            .plan(&prepared.entries, &request.video, prepared.source_duration)?;

        for issue in plan.issues() {
            warn!("⚠️ {}", issue);
        }
        Ok(plan)
    }

    /// Parse the chapters file, probe the source and build the plan
    pub async fn plan(&self, request: &SplitRequest) -> Result<SplitPlan> {
        let prepared = self.prepare(request).await?;
        self.build_plan(request, &prepared)
    }

    /// Split the source into chapter files, then verify unless disabled.
    ///
    /// Parse, timestamp, source probe and directory errors abort the run.
    /// Chapter extraction failures are reported in the returned report.
    pub async fn split(&self, request: &SplitRequest, cancel: &CancellationToken) -> Result<RunReport> {
        let started_at = Utc::now();
        let mut stages = vec![RunStage::Start];

        let prepared = self.prepare(request).await?;
        stages.push(RunStage::Parsed);
        let plan = self.build_plan(request, &prepared)?;
        let plan_issues = plan.issues();
        stages.push(RunStage::Planned);

        let executor = SplitExecutor::new(self.probe.clone(), self.extractor.clone())
            .with_tolerance(self.config.split.tolerance_seconds)
            .with_workers(self.config.effective_workers())
            .with_failure_policy(self.config.split.failure_policy);
        let execution = executor.execute(&plan, cancel).await?;
        stages.push(RunStage::Executed);

        let integrity = if self.config.split.verify_after_split {
            // Rebuilt from the same inputs rather than reusing the executed plan
            let plan = self
                .planner(request)
                .plan(&prepared.entries, &request.video, prepared.source_duration)?;
            let report = self.verifier().verify(&plan).await;
            stages.push(RunStage::Verified);
            Some(report)
        } else {
            None
        };

        let report = RunReport {
            request: request.clone(),
            mode: RunMode::Split,
            started_at,
            finished_at: Utc::now(),
            source_duration: prepared.source_duration,
            plan_issues,
            stages_completed: stages,
            execution: Some(execution),
            integrity,
        };

        self.save_report(request, &report).await;
        Ok(report)
    }

    /// Check existing chapter files against the source without extracting
    pub async fn verify(&self, request: &SplitRequest) -> Result<RunReport> {
        let started_at = Utc::now();
        let mut stages = vec![RunStage::Start];

        let prepared = self.prepare(request).await?;
        stages.push(RunStage::Parsed);
        let plan = self.build_plan(request, &prepared)?;
        let plan_issues = plan.issues();
        stages.push(RunStage::Planned);

        let integrity = self.verifier().verify(&plan).await;
        stages.push(RunStage::Verified);

        let report = RunReport {
            request: request.clone(),
            mode: RunMode::VerifyOnly,
            started_at,
            finished_at: Utc::now(),
            source_duration: prepared.source_duration,
            plan_issues,
            stages_completed: stages,
            execution: None,
            integrity: Some(integrity),
        };

        self.save_report(request, &report).await;
        Ok(report)
    }

    fn verifier(&self) -> IntegrityVerifier {
        IntegrityVerifier::new(self.probe.clone())
            .with_tolerance(self.config.split.tolerance_seconds)
            .with_workers(self.config.effective_workers())
    }

    /// Where the JSON run report goes, if reports are enabled
    pub fn report_path(&self, request: &SplitRequest) -> Option<PathBuf> {
        if !self.config.output.save_report {
            return None;
        }
        let dir = request.output_dir.as_deref().unwrap_or_else(|| Path::new("."));
        Some(dir.join(&self.config.output.report_file))
    }

    async fn save_report(&self, request: &SplitRequest, report: &RunReport) {
        let Some(path) = self.report_path(request) else {
            return;
        };

        let written = match serde_json::to_string_pretty(report) {
            Ok(json) => tokio::fs::write(&path, json).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match written {
            Ok(()) => info!("💾 Run report saved to: {}", path.display()),
            Err(e) => warn!("Failed to save run report to {}: {}", path.display(), e),
        }
    }
}
