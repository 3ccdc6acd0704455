/// Chapter list parsing
///
/// This module reads the user-supplied chapters definition (one
/// `<HH:MM:SS> <title>` per line) and converts its timestamps into seconds.

pub mod parser;
pub mod timecode;

// Re-export main types
pub use parser::ChapterListParser;
pub use timecode::TimeCode;

use serde::{Deserialize, Serialize};

/// A single line of the chapters definition, as written by the user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterEntry {
    /// Timestamp text, expected to be `HH:MM:SS`
    pub timestamp: String,
    /// Chapter title, may contain spaces
    pub title: String,
}

impl ChapterEntry {
    pub fn new(timestamp: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            title: title.into(),
        }
    }

    /// Parse the timestamp text into seconds
    pub fn start(&self) -> crate::Result<TimeCode> {
        TimeCode::parse(&self.timestamp)
    }
}
