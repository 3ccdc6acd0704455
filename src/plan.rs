use crate::chapters::{ChapterEntry, TimeCode};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default container extension for chapter outputs
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Source interval covered by one chapter. An `end` of `None` runs to the end
/// of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRange {
    pub start: TimeCode,
    pub end: Option<TimeCode>,
}

impl ChapterRange {
    pub fn new(start: TimeCode, end: Option<TimeCode>) -> Self {
        Self { start, end }
    }

    pub fn is_open_ended(&self) -> bool {
        self.end.is_none()
    }

    /// True when a closed range does not move forward in time
    pub fn is_degenerate(&self) -> bool {
        matches!(self.end, Some(end) if end <= self.start)
    }

    /// Duration the chapter output should have, in seconds
    pub fn expected_duration(&self, source_duration: f64) -> f64 {
        match self.end {
            Some(end) => end.as_secs_f64() - self.start.as_secs_f64(),
            None => source_duration - self.start.as_secs_f64(),
        }
    }
}

/// One planned chapter: where it comes from and where it goes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedChapter {
    /// 1-based chapter number
    pub index: usize,
    pub title: String,
    pub range: ChapterRange,
    pub output_path: PathBuf,
}

/// Ordered extraction plan for a single source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitPlan {
    pub source: PathBuf,
    pub source_duration: f64,
    pub output_dir: Option<PathBuf>,
    pub chapters: Vec<PlannedChapter>,
}

impl SplitPlan {
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedChapter> {
        self.chapters.iter()
    }

    pub fn expected_duration(&self, chapter: &PlannedChapter) -> f64 {
        chapter.range.expected_duration(self.source_duration)
    }

    /// Problems that make a chapter impossible to extract correctly
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for chapter in &self.chapters {
            if let Some(end) = chapter.range.end.filter(|_| chapter.range.is_degenerate()) {
                issues.push(format!(
                    "Chapter {} ({}): end {} is not after start {}",
                    chapter.index, chapter.title, end, chapter.range.start
                ));
            }

            if chapter.range.start.as_secs_f64() >= self.source_duration {
                issues.push(format!(
                    "Chapter {} ({}): start {} is at or beyond the source end ({:.2}s)",
                    chapter.index, chapter.title, chapter.range.start, self.source_duration
                ));
            }
        }

        issues
    }
}

/// Turns chapter entries into extraction ranges and output paths
#[derive(Debug, Clone)]
pub struct SplitPlanner {
    output_dir: Option<PathBuf>,
    extension: String,
}

impl SplitPlanner {
    /// An empty `output_dir` is treated the same as none: files land in the
    /// working directory.
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.filter(|dir| !dir.as_os_str().is_empty()),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Build the plan. Chapter `i` spans from its own timestamp to the next
    /// chapter's timestamp; the last chapter is open-ended.
    pub fn plan(
        &self,
        entries: &[ChapterEntry],
        source: &Path,
        source_duration: f64,
    ) -> Result<SplitPlan> {
        let starts = entries
            .iter()
            .map(ChapterEntry::start)
            .collect::<Result<Vec<_>>>()?;

        let chapters = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| PlannedChapter {
                index: i + 1,
                title: entry.title.clone(),
                range: ChapterRange::new(starts[i], starts.get(i + 1).copied()),
                output_path: self.output_path(i + 1, &entry.title),
            })
            .collect();

        Ok(SplitPlan {
            source: source.to_path_buf(),
            source_duration,
            output_dir: self.output_dir.clone(),
            chapters,
        })
    }

    /// `<index>. <title>.<ext>`, inside the output directory when one is set
    pub fn output_path(&self, index: usize, title: &str) -> PathBuf {
        let file_name = format!("{}. {}.{}", index, title, self.extension);
        match &self.output_dir {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SplitError;

    fn scenario_entries() -> Vec<ChapterEntry> {
        vec![
            ChapterEntry::new("00:00:00", "Intro"),
            ChapterEntry::new("00:01:00", "Body"),
            ChapterEntry::new("00:02:30", "End"),
        ]
    }

    #[test]
    fn test_scenario_plan() {
        let planner = SplitPlanner::new(Some(PathBuf::from("out")));
        let plan = planner
            .plan(&scenario_entries(), Path::new("talk.mkv"), 200.0)
            .unwrap();

        assert_eq!(plan.len(), 3);

        let first = &plan.chapters[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.range, ChapterRange::new(TimeCode::ZERO, Some(TimeCode::from_secs(60))));
        assert_eq!(first.output_path, Path::new("out").join("1. Intro.mp4"));

        let second = &plan.chapters[1];
        assert_eq!(second.range.start.as_secs(), 60);
        assert_eq!(second.range.end, Some(TimeCode::from_secs(150)));
        assert_eq!(second.output_path, Path::new("out").join("2. Body.mp4"));

        let last = &plan.chapters[2];
        assert!(last.range.is_open_ended());
        assert_eq!(last.output_path, Path::new("out").join("3. End.mp4"));
        assert_eq!(plan.expected_duration(last), 50.0);

        assert!(plan.issues().is_empty());
    }

    #[test]
    fn test_plan_is_complete_and_ordered() {
        let entries: Vec<ChapterEntry> = (0..25)
            .map(|i| ChapterEntry::new(TimeCode::from_secs(i * 30).to_string(), format!("Part {}", i)))
            .collect();
        let plan = SplitPlanner::new(None)
            .plan(&entries, Path::new("src.mp4"), 800.0)
            .unwrap();

        assert_eq!(plan.len(), 25);
        for (i, chapter) in plan.iter().enumerate() {
            assert_eq!(chapter.index, i + 1);
            assert_eq!(chapter.range.is_open_ended(), i == 24);
        }
        for pair in plan.chapters.windows(2) {
            assert_eq!(pair[0].range.end, Some(pair[1].range.start));
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let planner = SplitPlanner::new(Some(PathBuf::from("chapters")));
        let a = planner.plan(&scenario_entries(), Path::new("v.mp4"), 200.0).unwrap();
        let b = planner.plan(&scenario_entries(), Path::new("v.mp4"), 200.0).unwrap();
        assert_eq!(a.chapters, b.chapters);
    }

    #[test]
    fn test_no_output_dir_uses_bare_file_names() {
        let plan = SplitPlanner::new(None)
            .plan(&scenario_entries(), Path::new("v.mp4"), 200.0)
            .unwrap();
        assert_eq!(plan.chapters[0].output_path, PathBuf::from("1. Intro.mp4"));

        let planner = SplitPlanner::new(Some(PathBuf::new()));
        assert_eq!(planner.output_dir(), None);
        assert_eq!(planner.output_path(2, "Body"), PathBuf::from("2. Body.mp4"));
    }

    #[test]
    fn test_custom_extension() {
        let planner = SplitPlanner::new(None).with_extension("mkv");
        assert_eq!(planner.output_path(4, "Sweeps"), PathBuf::from("4. Sweeps.mkv"));
    }

    #[test]
    fn test_invalid_timestamp_fails_whole_plan() {
        let entries = vec![
            ChapterEntry::new("00:00:00", "Intro"),
            ChapterEntry::new("1:30", "Body"),
        ];
        let err = SplitPlanner::new(None)
            .plan(&entries, Path::new("v.mp4"), 200.0)
            .unwrap_err();
        assert!(matches!(err, SplitError::InvalidTimestamp { ref input, .. } if input == "1:30"));
    }

    #[test]
    fn test_out_of_order_chapters_are_reported() {
        let entries = vec![
            ChapterEntry::new("00:00:00", "Intro"),
            ChapterEntry::new("00:02:00", "Late"),
            ChapterEntry::new("00:01:00", "Early"),
            ChapterEntry::new("00:05:00", "Past the end"),
        ];
        let plan = SplitPlanner::new(None)
            .plan(&entries, Path::new("v.mp4"), 240.0)
            .unwrap();

        assert!(plan.chapters[1].range.is_degenerate());
        assert!(!plan.chapters[2].range.is_degenerate());
        assert_eq!(plan.expected_duration(&plan.chapters[1]), -60.0);

        let issues = plan.issues();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("Chapter 2"));
        assert!(issues[1].contains("beyond the source end"));
    }
}
