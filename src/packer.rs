//! Token-bounded packing of formatted blocks into output artifacts.
//!
//! The packer formats each [`SourceUnit`] into a block, measures it, and
//! appends it to a single live buffer. When the next block (plus the
//! separator in front of it) would push the buffer past the budget, the
//! buffer is flushed to the [`ArtifactStore`] first and the block starts a
//! fresh buffer.
//!
//! A block that alone exceeds the budget is never split: it becomes the
//! sole occupant of its artifact.

use crate::{
    config::Config,
    error::{Error, Result},
    file::SourceUnit,
    stats::{OutputFileRecord, PersistFailure},
    template::BlockTemplate,
    token::TokenEstimator,
    writer::ArtifactStore,
};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Settings that shape the packed output.
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Token budget per artifact
    pub max_tokens: usize,

    /// Block template
    pub template: BlockTemplate,

    /// Text between consecutive blocks of one artifact
    pub separator: String,

    /// Artifact name prefix
    pub root_name: String,
}

impl PackOptions {
    /// Extracts packing settings from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the template or root name is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let template = BlockTemplate::new(config.file_template.as_str())?;
        if !template.has_content() {
            warn!("file_template has no {{content}} placeholder; file contents will not be exported");
        }

        Ok(Self {
            max_tokens: config.max_tokens,
            template,
            separator: config.file_separator.clone(),
            root_name: config.resolved_root_name()?,
        })
    }
}

/// Result of one flush.
#[derive(Debug, Clone)]
#[must_use]
pub enum FlushOutcome {
    /// Nothing to persist; the buffer was empty or whitespace only
    Empty,

    /// The buffer was persisted as a new artifact
    Flushed(OutputFileRecord),

    /// The store rejected the artifact; its content is dropped
    PersistFailed {
        /// Artifact name that was attempted
        filename: String,
        /// Error reported by the store
        error: Error,
    },
}

impl FlushOutcome {
    /// Returns the record if an artifact was written.
    #[must_use]
    pub fn record(&self) -> Option<&OutputFileRecord> {
        match self {
            Self::Flushed(record) => Some(record),
            _ => None,
        }
    }
}

/// The live buffer and rotation counter of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackingState {
    content: String,
    token_count: usize,
    source_file_count: usize,
    counter: usize,
}

impl PackingState {
    fn new() -> Self {
        Self {
            content: String::new(),
            token_count: 0,
            source_file_count: 0,
            counter: 1,
        }
    }

    /// Accumulated buffer text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Tokens in the buffer, separators included.
    #[must_use]
    pub const fn token_count(&self) -> usize {
        self.token_count
    }

    /// Blocks in the buffer.
    #[must_use]
    pub const fn source_file_count(&self) -> usize {
        self.source_file_count
    }

    /// Number used for the next artifact name.
    #[must_use]
    pub const fn counter(&self) -> usize {
        self.counter
    }

    /// Returns true if no text has been buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    fn push(&mut self, text: &str, tokens: usize) {
        self.content.push_str(text);
        self.token_count = self.token_count.saturating_add(tokens);
    }

    /// Empties the buffer, keeping the counter.
    fn take(&mut self) -> (String, usize, usize) {
        let content = std::mem::take(&mut self.content);
        let tokens = std::mem::replace(&mut self.token_count, 0);
        let files = std::mem::replace(&mut self.source_file_count, 0);
        (content, tokens, files)
    }
}

/// Artifacts produced by a finished packer.
#[derive(Debug, Clone, Default)]
pub struct PackReport {
    /// Persisted artifacts, in rotation order
    pub records: Vec<OutputFileRecord>,

    /// Artifacts the store rejected
    pub persist_failures: Vec<PersistFailure>,
}

/// Packs blocks into token-bounded artifacts.
pub struct Packer<'a> {
    options: PackOptions,
    tokenizer: Arc<dyn TokenEstimator>,
    store: &'a mut dyn ArtifactStore,
    separator_tokens: usize,
    state: PackingState,
    report: PackReport,
}

impl<'a> Packer<'a> {
    /// Creates a packer writing into `store`.
    pub fn new(
        options: PackOptions,
        tokenizer: Arc<dyn TokenEstimator>,
        store: &'a mut dyn ArtifactStore,
    ) -> Self {
        let separator_tokens = tokenizer.estimate(&options.separator);
        debug!(
            "Packer ready: max {} tokens per file, separator costs {} tokens",
            options.max_tokens, separator_tokens
        );

        Self {
            options,
            tokenizer,
            store,
            separator_tokens,
            state: PackingState::new(),
            report: PackReport::default(),
        }
    }

    /// Current buffer state.
    #[must_use]
    pub const fn state(&self) -> &PackingState {
        &self.state
    }

    /// Records persisted so far.
    #[must_use]
    pub fn records(&self) -> &[OutputFileRecord] {
        &self.report.records
    }

    /// Formats `unit` and adds it to the buffer.
    ///
    /// Returns the outcome of the flush this block triggered, if any.
    pub fn ingest(&mut self, unit: &SourceUnit) -> Option<FlushOutcome> {
        let block = self
            .options
            .template
            .format(&unit.relative_path, &unit.content);
        let block_tokens = self.tokenizer.estimate(&block);
        trace!("Block {} costs {} tokens", unit.relative_path, block_tokens);

        if block_tokens > self.options.max_tokens {
            warn!(
                "{} alone costs {} tokens, over the {} token budget; it gets its own file",
                unit.relative_path, block_tokens, self.options.max_tokens
            );
        }

        let mut outcome = None;
        if !self.state.is_empty() {
            let needed = self
                .state
                .token_count
                .saturating_add(self.separator_tokens)
                .saturating_add(block_tokens);
            if needed > self.options.max_tokens {
                outcome = Some(self.flush());
            }
        }

        // A separator only ever goes in together with the block after it.
        if !self.state.is_empty() {
            self.state.push(&self.options.separator, self.separator_tokens);
        }
        self.state.push(&block, block_tokens);
        self.state.source_file_count += 1;

        outcome
    }

    /// Persists the buffer as the next artifact and resets it.
    ///
    /// An empty or whitespace-only buffer is left untouched and no artifact
    /// is created. On a persist failure the content is dropped and the
    /// counter stays, so the next artifact reuses the name.
    pub fn flush(&mut self) -> FlushOutcome {
        if self.state.content.trim().is_empty() {
            if self.state.source_file_count > 0 {
                debug!(
                    "Keeping whitespace-only buffer of {} files",
                    self.state.source_file_count
                );
            }
            return FlushOutcome::Empty;
        }

        let (content, token_count, source_file_count) = self.state.take();
        let body = content.trim_end();
        let filename = self.artifact_name();
        let text = format!("{body}\n");

        match self.store.persist(&filename, &text) {
            Ok(byte_size) => {
                let record = OutputFileRecord {
                    filename,
                    token_count,
                    byte_size,
                    source_file_count,
                };
                info!(
                    "Created {} with {} tokens from {} files",
                    record.filename, record.token_count, record.source_file_count
                );
                self.state.counter += 1;
                self.report.records.push(record.clone());
                FlushOutcome::Flushed(record)
            }
            Err(e) => {
                error!("Failed to write {}: {}", filename, e);
                self.report.persist_failures.push(PersistFailure {
                    filename: filename.clone(),
                    message: e.to_string(),
                });
                FlushOutcome::PersistFailed { filename, error: e }
            }
        }
    }

    /// Flushes any remainder and returns everything that was produced.
    pub fn finalize(mut self) -> PackReport {
        if let FlushOutcome::Flushed(record) = self.flush() {
            debug!("Final flush wrote {}", record.filename);
        }
        self.report
    }

    fn artifact_name(&self) -> String {
        format!("{}_{:02}.txt", self.options.root_name, self.state.counter)
    }
}
