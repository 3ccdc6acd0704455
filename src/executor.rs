use crate::config::FailurePolicy;
use crate::error::{Result, SplitError};
use crate::media::{MediaExtractor, MediaProbe};
use crate::plan::{PlannedChapter, SplitPlan};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Accepted drift between an existing output and its expected duration
pub const DEFAULT_TOLERANCE_SECONDS: f64 = 1.0;

/// What happened to a single chapter during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChapterOutcome {
    /// A matching output was already on disk
    Skipped { existing_duration: f64 },
    Extracted,
    Failed { error: String },
    /// Never dispatched because the run was cancelled or aborted
    Cancelled,
}

/// State of a chapter's output file before extraction
#[derive(Debug, Clone, PartialEq)]
pub enum ExistingOutput {
    Missing,
    /// Present and within tolerance of the expected duration
    Valid(f64),
    /// Present but with the wrong duration
    Mismatch(f64),
    /// Present but could not be probed
    Unreadable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterResult {
    pub index: usize,
    pub title: String,
    pub output_path: PathBuf,
    pub expected_duration: f64,
    pub outcome: ChapterOutcome,
    pub elapsed: Duration,
}

impl ChapterResult {
    fn new(chapter: &PlannedChapter, expected_duration: f64, outcome: ChapterOutcome, elapsed: Duration) -> Self {
        Self {
            index: chapter.index,
            title: chapter.title.clone(),
            output_path: chapter.output_path.clone(),
            expected_duration,
            outcome,
            elapsed,
        }
    }
}

/// Per-chapter results of one executor run, in chapter order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub results: Vec<ChapterResult>,
    pub total_time: Duration,
}

impl ExecutionReport {
    fn count(&self, predicate: impl Fn(&ChapterOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }

    pub fn extracted(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Extracted))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Cancelled))
    }

    /// Chapters whose output is known good after this run
    pub fn completed(&self) -> usize {
        self.extracted() + self.skipped()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.cancelled() == 0
    }
}

/// Extracts planned chapters, skipping those whose output is already correct
#[derive(Clone)]
pub struct SplitExecutor {
    probe: Arc<dyn MediaProbe>,
    extractor: Arc<dyn MediaExtractor>,
    tolerance: f64,
    max_workers: usize,
    failure_policy: FailurePolicy,
}

impl SplitExecutor {
    pub fn new(probe: Arc<dyn MediaProbe>, extractor: Arc<dyn MediaExtractor>) -> Self {
        Self {
            probe,
            extractor,
            tolerance: DEFAULT_TOLERANCE_SECONDS,
            max_workers: 1,
            failure_policy: FailurePolicy::Continue,
        }
    }

    pub fn with_tolerance(mut self, seconds: f64) -> Self {
        self.tolerance = seconds;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Run every chapter of the plan.
    ///
    /// The output directory is created once before any chapter starts. Chapter
    /// failures are recorded in the report; only directory creation errors are
    /// returned. Once `cancel` fires no further chapter is started, in-flight
    /// chapters run to completion.
    pub async fn execute(&self, plan: &SplitPlan, cancel: &CancellationToken) -> Result<ExecutionReport> {
        let start_time = Instant::now();

        if let Some(dir) = &plan.output_dir {
            ensure_output_dir(dir).await?;
        }

        let results = if self.max_workers <= 1 {
            self.execute_sequential(plan, cancel).await
        } else {
            self.execute_parallel(plan, cancel).await
        };

        let report = ExecutionReport {
            results,
            total_time: start_time.elapsed(),
        };

        info!(
            "🎬 Split finished in {:.2}s: {} extracted, {} already present, {} failed, {} cancelled",
            report.total_time.as_secs_f64(),
            report.extracted(),
            report.skipped(),
            report.failed(),
            report.cancelled()
        );

        Ok(report)
    }

    async fn execute_sequential(&self, plan: &SplitPlan, cancel: &CancellationToken) -> Vec<ChapterResult> {
        let mut results = Vec::with_capacity(plan.len());
        let mut aborted = false;

        for chapter in plan.iter() {
            if aborted || cancel.is_cancelled() {
                results.push(cancelled(plan, chapter));
                continue;
            }

            info!("📹 Chapter {}/{}: {}", chapter.index, plan.len(), chapter.title);
            let result = self.run_chapter(&plan.source, plan.source_duration, chapter).await;

            if matches!(result.outcome, ChapterOutcome::Failed { .. })
                && self.failure_policy == FailurePolicy::Abort
            {
                warn!("Aborting split after chapter {} failed", chapter.index);
                aborted = true;
            }
            results.push(result);
        }

        results
    }

    async fn execute_parallel(&self, plan: &SplitPlan, cancel: &CancellationToken) -> Vec<ChapterResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let aborted = Arc::new(AtomicBool::new(false));
        let source = Arc::new(plan.source.clone());
        let mut handles = Vec::with_capacity(plan.len());
        let mut undispatched = Vec::new();

        info!("🔧 Extracting with up to {} workers", self.max_workers);

        for chapter in plan.iter() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };

            let permit = match permit {
                Some(permit) if !aborted.load(Ordering::SeqCst) => permit,
                _ => {
                    undispatched.push(cancelled(plan, chapter));
                    continue;
                }
            };

            let executor = self.clone();
            let source = Arc::clone(&source);
            let aborted = Arc::clone(&aborted);
            let task_chapter = chapter.clone();
            let source_duration = plan.source_duration;
            let total = plan.len();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let chapter = task_chapter;
                info!("📹 Chapter {}/{}: {}", chapter.index, total, chapter.title);

                let result = executor.run_chapter(&source, source_duration, &chapter).await;
                if matches!(result.outcome, ChapterOutcome::Failed { .. })
                    && executor.failure_policy == FailurePolicy::Abort
                {
                    warn!("Aborting split after chapter {} failed", chapter.index);
                    aborted.store(true, Ordering::SeqCst);
                }
                result
            });
            handles.push((chapter.clone(), handle));
        }

        let mut results = undispatched;
        for (chapter, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!("Chapter {} task did not complete: {}", chapter.index, e);
                    results.push(ChapterResult::new(
                        &chapter,
                        plan.expected_duration(&chapter),
                        ChapterOutcome::Failed { error: e.to_string() },
                        Duration::ZERO,
                    ));
                }
            }
        }

        results.sort_by_key(|r| r.index);
        results
    }

    /// Skip-or-extract for one chapter
    async fn run_chapter(&self, source: &Path, source_duration: f64, chapter: &PlannedChapter) -> ChapterResult {
        let start_time = Instant::now();
        let expected = chapter.range.expected_duration(source_duration);

        let outcome = match self.try_chapter(source, expected, chapter).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("❌ Chapter {} ({}) failed: {}", chapter.index, chapter.title, e);
                ChapterOutcome::Failed { error: e.to_string() }
            }
        };

        ChapterResult::new(chapter, expected, outcome, start_time.elapsed())
    }

    async fn try_chapter(&self, source: &Path, expected: f64, chapter: &PlannedChapter) -> Result<ChapterOutcome> {
        if let (true, Some(end)) = (chapter.range.is_degenerate(), chapter.range.end) {
            return Err(SplitError::DegenerateRange {
                index: chapter.index,
                start: chapter.range.start.to_string(),
                end: end.to_string(),
            });
        }

        match self.check_existing(chapter, expected).await {
            ExistingOutput::Valid(existing_duration) => {
                info!(
                    "⏭️  {} already exists ({:.2}s), skipping",
                    chapter.output_path.display(),
                    existing_duration
                );
                return Ok(ChapterOutcome::Skipped { existing_duration });
            }
            ExistingOutput::Mismatch(actual) => {
                info!(
                    "🔁 {} is {:.2}s, expected {:.2}s; extracting again",
                    chapter.output_path.display(),
                    actual,
                    expected
                );
            }
            ExistingOutput::Unreadable(reason) => {
                warn!(
                    "Existing {} could not be probed ({}); extracting again",
                    chapter.output_path.display(),
                    reason
                );
            }
            ExistingOutput::Missing => {}
        }

        self.extractor.extract(source, &chapter.range, &chapter.output_path).await?;
        info!("✅ Wrote {}", chapter.output_path.display());
        Ok(ChapterOutcome::Extracted)
    }

    /// Inspect a chapter's output path. Probe failures are reported, never
    /// raised, so the caller can fall back to extracting.
    pub async fn check_existing(&self, chapter: &PlannedChapter, expected: f64) -> ExistingOutput {
        match tokio::fs::try_exists(&chapter.output_path).await {
            Ok(true) => {}
            Ok(false) => return ExistingOutput::Missing,
            Err(e) => return ExistingOutput::Unreadable(e.to_string()),
        }

        match self.probe.duration(&chapter.output_path).await {
            Ok(actual) if within_tolerance(expected, actual, self.tolerance) => ExistingOutput::Valid(actual),
            Ok(actual) => ExistingOutput::Mismatch(actual),
            Err(e) => ExistingOutput::Unreadable(e.to_string()),
        }
    }
}

/// Strictly less than the tolerance; a drift of exactly the tolerance fails
pub fn within_tolerance(expected: f64, actual: f64, tolerance: f64) -> bool {
    (expected - actual).abs() < tolerance
}

async fn ensure_output_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| SplitError::DirectoryCreateFailed {
            path: dir.to_path_buf(),
            source,
        })?;
    debug!("📂 Output directory ready: {}", dir.display());
    Ok(())
}

fn cancelled(plan: &SplitPlan, chapter: &PlannedChapter) -> ChapterResult {
    ChapterResult::new(
        chapter,
        plan.expected_duration(chapter),
        ChapterOutcome::Cancelled,
        Duration::ZERO,
    )
}
