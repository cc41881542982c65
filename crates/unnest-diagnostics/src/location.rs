//! Locations of diagnostics in IR input files.

use serde::{Deserialize, Serialize};

/// Where a diagnostic points: the source position the front end recorded
/// for an IR definition, or the IR file itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File path
    pub file: String,
    /// Line number (1-indexed), 0 when only the file is known
    pub line: u32,
}

impl Location {
    /// Create a new location.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// A location naming only a file.
    pub fn file(file: impl Into<String>) -> Self {
        Self::new(file, 0)
    }

    /// Check if a line is known.
    pub fn has_line(&self) -> bool {
        self.line > 0
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_line() {
            write!(f, "{}:{}", self.file, self.line)
        } else {
            f.write_str(&self.file)
        }
    }
}

/// A note attached to a diagnostic, optionally at its own location.
#[derive(Debug, Clone)]
pub struct Label {
    /// Where the note points
    pub location: Option<Location>,
    /// Message to display
    pub message: String,
}

impl Label {
    pub fn new(location: Option<Location>, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}
