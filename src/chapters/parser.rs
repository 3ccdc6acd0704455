//! Chapters definition file parsing
use super::ChapterEntry;
use crate::error::{Result, SplitError};
use std::path::Path;
use tracing::{debug, info};

/// Reads `<timestamp> <title>` lines into ordered chapter entries
#[derive(Debug, Clone, Copy, Default)]
pub struct ChapterListParser;

impl ChapterListParser {
    pub fn new() -> Self {
        Self
    }

    /// Read and parse a chapters definition file
    pub async fn parse_file(&self, path: &Path) -> Result<Vec<ChapterEntry>> {
        let content = tokio::fs::read_to_string(path).await?;
        let entries = self.parse_str(&content)?;

        info!("📖 Read {} chapters from {}", entries.len(), path.display());
        Ok(entries)
    }

    /// Parse chapter definitions from text.
    ///
    /// Each line is split at its first whitespace into timestamp and title, so
    /// titles keep their inner spaces. Blank and whitespace-only lines are
    /// skipped. The timestamp text is kept verbatim; it is validated when the
    /// plan is built.
    pub fn parse_str(&self, content: &str) -> Result<Vec<ChapterEntry>> {
        let mut entries = Vec::new();

        for (index, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                debug!("Skipping blank chapter line {}", index + 1);
                continue;
            }

            let malformed = || SplitError::MalformedChapterLine {
                line_number: index + 1,
                line: line.to_string(),
            };

            let (timestamp, title) = line.split_once(char::is_whitespace).ok_or_else(malformed)?;
            let title = title.trim_start();
            if title.is_empty() {
                return Err(malformed());
            }

            entries.push(ChapterEntry::new(timestamp, title));
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_keeps_order_and_spaces_in_titles() {
        let parser = ChapterListParser::new();
        let entries = parser
            .parse_str("00:00:00 Welcome\n00:01:23 Closed guard  basics\n01:00:00 Q & A\n")
            .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], ChapterEntry::new("00:00:00", "Welcome"));
        assert_eq!(entries[1].title, "Closed guard  basics");
        assert_eq!(entries[2].timestamp, "01:00:00");
        assert_eq!(entries[2].title, "Q & A");
    }

    #[test]
    fn test_blank_lines_and_crlf_are_tolerated() {
        let parser = ChapterListParser::new();
        let entries = parser
            .parse_str("\r\n00:00:00 Intro\r\n   \r\n00:01:00\tBody\r\n\n")
            .unwrap();

        assert_eq!(
            entries,
            vec![
                ChapterEntry::new("00:00:00", "Intro"),
                ChapterEntry::new("00:01:00", "Body"),
            ]
        );
    }

    #[test]
    fn test_line_without_title_is_malformed() {
        let parser = ChapterListParser::new();
        let err = parser.parse_str("00:00:00 Intro\n00:01:00\n").unwrap_err();

        match err {
            SplitError::MalformedChapterLine { line_number, line } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "00:01:00");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_file_yields_no_chapters() {
        let parser = ChapterListParser::new();
        assert!(parser.parse_str("").unwrap().is_empty());
        assert!(parser.parse_str("\n \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chapters.txt");
        std::fs::write(&path, "00:00:00 Intro\n00:01:00 Body\n").unwrap();

        let entries = tokio_test::block_on(ChapterListParser::new().parse_file(&path)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].title, "Body");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = ChapterListParser::new()
            .parse_file(Path::new("/definitely/not/here/chapters.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::Io(_)));
    }
}
