use std::path::PathBuf;

/// Result type for chapter splitting operations
pub type Result<T> = std::result::Result<T, SplitError>;

/// Error types for chapter splitting operations
#[derive(thiserror::Error, Debug)]
pub enum SplitError {
    /// A chapters file line that cannot be split into timestamp and title
    #[error("malformed chapter line {line_number}: {line:?} (expected \"<HH:MM:SS> <title>\")")]
    MalformedChapterLine { line_number: usize, line: String },

    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp { input: String, reason: String },

    /// Source or output media could not be probed for its duration
    #[error("failed to probe {}: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },

    #[error("extraction into {} failed: {reason}", path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    /// A chapter whose end does not come after its start
    #[error("chapter {index} has an empty or negative range ({start} -> {end})")]
    DegenerateRange { index: usize, start: String, end: String },

    #[error("cannot create output directory {}: {source}", path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SplitError {
    pub(crate) fn probe(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Probe {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn extraction(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ExtractionFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_timestamp(input: &str, reason: impl ToString) -> Self {
        Self::InvalidTimestamp {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must abort the whole run rather than a single chapter
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SplitError::ExtractionFailed { .. } | SplitError::DegenerateRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_input() {
        let err = SplitError::MalformedChapterLine {
            line_number: 3,
            line: "00:00:00".to_string(),
        };
        assert!(err.to_string().contains("line 3"));
        assert!(err.to_string().contains("00:00:00"));

        let err = SplitError::invalid_timestamp("1:2", "expected 3 components, found 2");
        assert!(err.to_string().contains("\"1:2\""));
    }

    #[test]
    fn test_chapter_level_errors_are_not_fatal() {
        assert!(!SplitError::extraction("out.mp4", "boom").is_fatal());
        assert!(!SplitError::DegenerateRange {
            index: 2,
            start: "00:01:00".to_string(),
            end: "00:00:30".to_string(),
        }
        .is_fatal());
        assert!(SplitError::probe("in.mp4", "no such file").is_fatal());
    }
}
