//! Ignore rules applied during traversal.
//!
//! Directories are excluded by exact name at any depth. Files are excluded
//! when their `/`-separated relative path matches a glob; as with shell
//! `fnmatch`, `*` also matches across `/`.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;

/// Compiled ignore rules.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    dirs: HashSet<String>,
    patterns: GlobSet,
}

impl IgnoreRules {
    /// Compiles the configured directory names and file patterns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a pattern is not a valid glob.
    pub fn new(ignore_dirs: &[String], ignore_patterns: &[String]) -> Result<Self> {
        Ok(Self {
            dirs: ignore_dirs.iter().cloned().collect(),
            patterns: build_globset(ignore_patterns)?,
        })
    }

    /// Returns true if a directory with this name should be pruned.
    #[must_use]
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.dirs.contains(name)
    }

    /// Returns true if a file at this relative path should be skipped.
    #[must_use]
    pub fn is_ignored_file(&self, relative_path: &str) -> bool {
        self.patterns.is_match(relative_path)
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            dirs: HashSet::new(),
            patterns: GlobSet::empty(),
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::invalid_pattern(pattern.as_str(), e.kind().to_string()))?;
        builder.add(glob);
    }

    builder
        .build()
        .map_err(|e| Error::invalid_pattern(patterns.join(", "), e.to_string()))
}
