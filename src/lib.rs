/// Chapter Splitter
///
/// Splits one video into per-chapter files from a `<HH:MM:SS> <title>` list,
/// skips chapters whose output already matches, and verifies that the chapter
/// files add back up to the source.

pub mod chapters;
pub mod config;
pub mod error;
pub mod executor;
pub mod media;
pub mod plan;
pub mod processing;
pub mod verify;

// Re-export main types for easy access
pub use crate::chapters::{ChapterEntry, ChapterListParser, TimeCode};
pub use crate::config::{Config, ConfigBuilder, FailurePolicy};
pub use crate::error::{Result, SplitError};
pub use crate::executor::{ChapterOutcome, ExecutionReport, ExistingOutput, SplitExecutor};
pub use crate::media::{FfmpegTools, MediaExtractor, MediaProbe};
pub use crate::plan::{ChapterRange, PlannedChapter, SplitPlan, SplitPlanner};
pub use crate::processing::{ChapterSplitter, RunMode, RunReport, RunStage, SplitRequest};
pub use crate::verify::{IntegrityReport, IntegrityVerifier, Verdict};
