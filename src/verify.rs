//! Post-split integrity verification
//!
//! The durations of all chapter outputs on disk are summed and compared with
//! the source duration. A mismatch is a [`Verdict::Fail`], never an error:
//! missing chapters simply contribute nothing, so an interrupted split shows
//! up as an undercount.

use crate::executor::{within_tolerance, DEFAULT_TOLERANCE_SECONDS};
use crate::media::MediaProbe;
use crate::plan::{PlannedChapter, SplitPlan};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// What was found at a chapter's output path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChapterPresence {
    Present { duration: f64 },
    Missing,
    Unreadable { reason: String },
}

impl ChapterPresence {
    pub fn duration(&self) -> f64 {
        match self {
            ChapterPresence::Present { duration } => *duration,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterCheck {
    pub index: usize,
    pub title: String,
    pub output_path: PathBuf,
    pub expected_duration: f64,
    pub presence: ChapterPresence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub source_duration: f64,
    pub total_chapter_duration: f64,
    pub tolerance: f64,
    pub verdict: Verdict,
    pub chapters: Vec<ChapterCheck>,
}

impl IntegrityReport {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Signed source minus chapters; positive means chapters are short
    pub fn difference(&self) -> f64 {
        self.source_duration - self.total_chapter_duration
    }

    pub fn missing(&self) -> Vec<&ChapterCheck> {
        self.chapters
            .iter()
            .filter(|c| matches!(c.presence, ChapterPresence::Missing))
            .collect()
    }

    pub fn unreadable(&self) -> Vec<&ChapterCheck> {
        self.chapters
            .iter()
            .filter(|c| matches!(c.presence, ChapterPresence::Unreadable { .. }))
            .collect()
    }
}

/// Checks that chapter outputs add back up to the source
#[derive(Clone)]
pub struct IntegrityVerifier {
    probe: Arc<dyn MediaProbe>,
    tolerance: f64,
    max_workers: usize,
}

impl IntegrityVerifier {
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        Self {
            probe,
            tolerance: DEFAULT_TOLERANCE_SECONDS,
            max_workers: 1,
        }
    }

    pub fn with_tolerance(mut self, seconds: f64) -> Self {
        self.tolerance = seconds;
        self
    }

    /// Maximum number of chapter outputs probed at the same time
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    pub async fn verify(&self, plan: &SplitPlan) -> IntegrityReport {
        info!("🔍 Verifying {} chapter files against {}", plan.len(), plan.source.display());

        let chapters: Vec<ChapterCheck> = stream::iter(plan.iter())
            .map(|chapter| self.check_chapter(plan, chapter))
            .buffered(self.max_workers)
            .collect()
            .await;

        let total_chapter_duration: f64 = chapters.iter().map(|c| c.presence.duration()).sum();
        let verdict = if within_tolerance(plan.source_duration, total_chapter_duration, self.tolerance) {
            Verdict::Pass
        } else {
            Verdict::Fail
        };

        let report = IntegrityReport {
            source_duration: plan.source_duration,
            total_chapter_duration,
            tolerance: self.tolerance,
            verdict,
            chapters,
        };

        match report.verdict {
            Verdict::Pass => info!(
                "✅ Integrity check passed: chapters total {:.2}s, source is {:.2}s",
                report.total_chapter_duration, report.source_duration
            ),
            Verdict::Fail => warn!(
                "❌ Integrity check failed: chapters total {:.2}s, source is {:.2}s ({} missing, {} unreadable)",
                report.total_chapter_duration,
                report.source_duration,
                report.missing().len(),
                report.unreadable().len()
            ),
        }

        report
    }

    async fn check_chapter(&self, plan: &SplitPlan, chapter: &PlannedChapter) -> ChapterCheck {
        let presence = match tokio::fs::try_exists(&chapter.output_path).await {
            Ok(true) => match self.probe.duration(&chapter.output_path).await {
                Ok(duration) => ChapterPresence::Present { duration },
                Err(e) => {
                    warn!("Cannot probe {}: {}", chapter.output_path.display(), e);
                    ChapterPresence::Unreadable { reason: e.to_string() }
                }
            },
            Ok(false) => ChapterPresence::Missing,
            Err(e) => ChapterPresence::Unreadable { reason: e.to_string() },
        };

        debug!("Chapter {}: {:?}", chapter.index, presence);

        ChapterCheck {
            index: chapter.index,
            title: chapter.title.clone(),
            output_path: chapter.output_path.clone(),
            expected_duration: plan.expected_duration(chapter),
            presence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_duration() {
        assert_eq!(ChapterPresence::Present { duration: 12.5 }.duration(), 12.5);
        assert_eq!(ChapterPresence::Missing.duration(), 0.0);
        assert_eq!(
            ChapterPresence::Unreadable { reason: "bad".to_string() }.duration(),
            0.0
        );
    }

    #[test]
    fn test_verdict_rendering() {
        assert_eq!(Verdict::Pass.to_string(), "PASS");
        assert_eq!(serde_json::to_string(&Verdict::Fail).unwrap(), "\"FAIL\"");
    }
}
