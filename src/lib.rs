//! # concatext
//!
//! Packs a directory tree into a numbered series of text files, none of
//! which exceeds a token budget.
//!
//! ## Features
//!
//! - Deterministic, sorted traversal with directory and glob exclusions
//! - Configurable block template with `{path}`, `{name}` and `{content}`
//! - Pluggable token counting (word, character, BPE)
//! - Whole-word obscuration of sensitive terms
//! - Atomic file operations with optional backups
//!
//! ## Quick Start
//!
//! ```no_run
//! use concatext::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./src")
//!     .output_dir("./export")
//!     .max_tokens(100_000)
//!     .build()?;
//!
//! let stats = Pipeline::new(config)?.run()?;
//! println!("{}", stats.render_summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Scanner**: walks the root in file-name order, applying ignore rules
//! 2. **Reader**: decodes each file as UTF-8 or marks it non-text
//! 3. **Packer**: formats blocks and rotates output files at the budget
//! 4. **Store**: persists each flushed buffer

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod config_file;
mod error;
mod file;
mod filter;
mod obscure;
mod packer;
mod pipeline;
mod scanner;
mod stats;
mod template;
mod token;
mod writer;

pub use config::{
    Config, ConfigBuilder, DEFAULT_FILE_SEPARATOR, DEFAULT_MAX_TOKENS,
    DEFAULT_NON_TEXT_PLACEHOLDER,
};
pub use config_file::{FileConfig, DEFAULT_CONFIG_FILE};
pub use error::{Error, Result};
pub use file::{read_source, SourceContent, SourceEntry, SourceUnit};
pub use filter::IgnoreRules;
pub use obscure::Obscurer;
pub use packer::{FlushOutcome, PackOptions, PackReport, Packer, PackingState};
pub use pipeline::Pipeline;
pub use stats::{format_size, OutputFileRecord, PersistFailure, RunStatistics};
pub use template::{format_block, BlockTemplate, DEFAULT_FILE_TEMPLATE};
pub use token::{TokenEstimator, TokenizerKind};
pub use writer::{write_summary_json, ArtifactStore, DryRunStore, FsStore, MemoryStore};

/// Runs one packing pass with the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The tokenizer cannot be initialized
/// - The output directory cannot be created
/// - The root directory cannot be walked
///
/// # Examples
///
/// ```no_run
/// use concatext::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .build()?;
///
/// let stats = run(config)?;
/// assert!(stats.is_complete());
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<RunStatistics> {
    Pipeline::new(config)?.run()
}
