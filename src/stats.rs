//! Run statistics and the end-of-run report.
//!
//! Totals are never tracked separately: they are sums over the output
//! records, so they always agree with what was written.

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const REPORT_WIDTH: usize = 80;

/// One persisted output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFileRecord {
    /// Artifact name, e.g. `project_01.txt`
    pub filename: String,

    /// Tokens accumulated in the buffer, separators included
    pub token_count: usize,

    /// Bytes persisted
    pub byte_size: u64,

    /// Number of blocks in the artifact
    pub source_file_count: usize,
}

/// An artifact that could not be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistFailure {
    /// Artifact name that was attempted
    pub filename: String,

    /// Error message from the store
    pub message: String,
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    /// Prefix of the output file names
    pub root_name: String,

    /// When the run started
    pub started_at: DateTime<Local>,

    /// Wall-clock duration of the run
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,

    /// Token budget per output file
    pub max_tokens: usize,

    /// Files read, text or not; ignored files excluded
    pub files_processed: usize,

    /// Files that could not be read as text
    pub non_text_files: usize,

    /// Whether non-text files were exported as placeholders
    pub non_text_included: bool,

    /// Files skipped by an ignore pattern
    pub ignored_files: usize,

    /// Directories pruned by name
    pub ignored_dirs: usize,

    /// Persisted artifacts, in rotation order
    pub records: Vec<OutputFileRecord>,

    /// Artifacts lost to persist failures
    pub persist_failures: Vec<PersistFailure>,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl RunStatistics {
    /// Creates empty statistics for a run starting now.
    #[must_use]
    pub fn new(root_name: impl Into<String>, max_tokens: usize, non_text_included: bool) -> Self {
        Self {
            root_name: root_name.into(),
            started_at: Local::now(),
            elapsed: Duration::ZERO,
            max_tokens,
            files_processed: 0,
            non_text_files: 0,
            non_text_included,
            ignored_files: 0,
            ignored_dirs: 0,
            records: Vec::new(),
            persist_failures: Vec::new(),
        }
    }

    /// Total tokens across all output files.
    #[must_use]
    pub fn total_tokens(&self) -> usize {
        self.records.iter().map(|r| r.token_count).sum()
    }

    /// Total bytes across all output files.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.byte_size).sum()
    }

    /// Total source files packed into output files.
    #[must_use]
    pub fn total_source_files(&self) -> usize {
        self.records.iter().map(|r| r.source_file_count).sum()
    }

    /// Returns true if every artifact was persisted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.persist_failures.is_empty()
    }

    /// Renders the human-readable end-of-run report.
    #[must_use]
    pub fn render_summary(&self) -> String {
        SummaryReport(self).to_string()
    }
}

struct SummaryReport<'a>(&'a RunStatistics);

impl fmt::Display for SummaryReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.0;
        let rule = "=".repeat(REPORT_WIDTH);

        writeln!(f, "\n{rule}")?;
        writeln!(f, "{:^width$}", "CONCATEXT EXECUTION SUMMARY", width = REPORT_WIDTH)?;
        writeln!(f, "{rule}")?;

        writeln!(f, "\nINFORMATION")?;
        writeln!(
            f,
            "  • Start Time: {}",
            stats.started_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(
            f,
            "  • Execution time: {:.2} seconds",
            stats.elapsed.as_secs_f64()
        )?;
        writeln!(f, "  • Directory name: {}", stats.root_name)?;
        writeln!(
            f,
            "  • Max tokens / file: {}",
            group_thousands(stats.max_tokens)
        )?;

        let non_text_status = if stats.non_text_included {
            "(included)"
        } else {
            "(not included)"
        };
        writeln!(f, "\nSTATISTICS")?;
        writeln!(f, "  • Processed files: {}", stats.files_processed)?;
        writeln!(
            f,
            "  • Non-text files: {} {non_text_status}",
            stats.non_text_files
        )?;
        writeln!(f, "  • Ignored files: {}", stats.ignored_files)?;
        writeln!(f, "  • Ignored directories: {}", stats.ignored_dirs)?;

        writeln!(f, "\nOUTPUT ({})", stats.records.len())?;
        for (idx, record) in stats.records.iter().enumerate() {
            writeln!(f, "  {}. {}", idx + 1, record.filename)?;
            writeln!(f, "     - Tokens: {}", group_thousands(record.token_count))?;
            writeln!(f, "     - Size: {}", format_size(record.byte_size))?;
            writeln!(f, "     - Source files: {}", record.source_file_count)?;
        }

        if !stats.persist_failures.is_empty() {
            writeln!(f, "\nFAILED ({})", stats.persist_failures.len())?;
            for failure in &stats.persist_failures {
                writeln!(f, "  • {}: {}", failure.filename, failure.message)?;
            }
        }

        writeln!(f, "\nTOTALS")?;
        writeln!(
            f,
            "  • Total tokens: {}",
            group_thousands(stats.total_tokens())
        )?;
        writeln!(
            f,
            "  • Total output size: {}",
            format_size(stats.total_bytes())
        )?;
        writeln!(f, "  • Total source files: {}", stats.total_source_files())?;

        writeln!(f, "\n{rule}")?;
        writeln!(f, "{:^width$}", "END OF CONCATEXT EXECUTION", width = REPORT_WIDTH)?;
        writeln!(f, "{rule}")
    }
}

/// Formats a byte count with two decimals in B, KB, MB, GB or TB.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{size:.2} {}", SIZE_UNITS[unit])
}

/// Formats an integer with `,` thousands separators.
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
