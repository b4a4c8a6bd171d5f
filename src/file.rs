use std::fs;
use std::path::{Path, PathBuf};

/// Result of reading one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContent {
    /// UTF-8 text, right-trimmed of trailing whitespace
    Text(String),

    /// The file could not be read or is not valid UTF-8
    NonText {
        /// Why the file was classified as non-text
        reason: String,
    },
}

impl SourceContent {
    /// Returns true if this is text content.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

/// One processed filesystem entry, ready for formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Path relative to the root, `/`-separated
    pub relative_path: String,

    /// Whether the file was read as text
    pub is_text: bool,

    /// File text, or the non-text placeholder
    pub content: String,
}

impl SourceUnit {
    /// Creates a unit for a text file.
    #[must_use]
    pub fn text(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_text: true,
            content: content.into(),
        }
    }

    /// Creates a unit for a non-text file represented by `placeholder`.
    #[must_use]
    pub fn non_text(relative_path: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_text: false,
            content: placeholder.into(),
        }
    }
}

/// A file discovered by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Absolute path to the file
    pub absolute_path: PathBuf,

    /// Relative path from the root directory, `/`-separated
    pub relative_path: String,
}

/// Reads a file and classifies it.
///
/// A file is text when its bytes decode as UTF-8. Read errors and decode
/// failures both yield [`SourceContent::NonText`]; neither is fatal.
#[must_use]
pub fn read_source(path: &Path) -> SourceContent {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return SourceContent::NonText {
                reason: e.to_string(),
            };
        }
    };

    match String::from_utf8(bytes) {
        Ok(mut text) => {
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
            SourceContent::Text(text)
        }
        Err(e) => SourceContent::NonText {
            reason: e.utf8_error().to_string(),
        },
    }
}
