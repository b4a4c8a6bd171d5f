use crate::{
    config::Config,
    error::Result,
    file::{read_source, SourceContent, SourceEntry, SourceUnit},
    obscure::Obscurer,
    packer::{FlushOutcome, PackOptions, Packer},
    scanner::Scanner,
    stats::RunStatistics,
    token::TokenEstimator,
    writer::{write_summary_json, ArtifactStore, DryRunStore, FsStore},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Main pipeline orchestrator: scan, read, obscure, pack.
pub struct Pipeline {
    config: Config,
    scanner: Scanner,
    tokenizer: Arc<dyn TokenEstimator>,
    obscurer: Obscurer,
    options: PackOptions,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The tokenizer cannot be initialized
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let scanner = Scanner::new(&config)?;
        let tokenizer = config.tokenizer.create()?;
        let obscurer = Obscurer::new(&config.obscured_words)?;
        let options = PackOptions::from_config(&config)?;

        Ok(Self {
            config,
            scanner,
            tokenizer,
            obscurer,
            options,
        })
    }

    /// Configuration this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Executes a run against the configured output directory.
    ///
    /// In dry-run mode nothing is written; the returned statistics describe
    /// what would have been.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory cannot be created, the
    /// root cannot be walked, or the JSON summary cannot be written.
    /// Failed artifact writes are not errors; they are listed in
    /// [`RunStatistics::persist_failures`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use concatext::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .root_dir("./src")
    ///     .output_dir("./out")
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// println!("{}", stats.render_summary());
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run(&self) -> Result<RunStatistics> {
        if self.config.dry_run {
            warn!("Dry run mode enabled - skipping file writes");
            return self.run_with_store(&mut DryRunStore);
        }

        let mut store = FsStore::from_config(&self.config)?;
        let stats = self.run_with_store(&mut store)?;

        if self.config.write_summary {
            write_summary_json(store.output_dir(), &stats)?;
        }

        Ok(stats)
    }

    /// Executes a run, handing every artifact to `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be walked.
    #[instrument(level = "debug", skip_all)]
    pub fn run_with_store(&self, store: &mut dyn ArtifactStore) -> Result<RunStatistics> {
        let start_time = Instant::now();
        let mut stats = RunStatistics::new(
            self.options.root_name.as_str(),
            self.config.max_tokens,
            self.config.include_non_text_files,
        );

        info!("Starting scan of: {}", self.config.root_dir.display());

        let mut walk = self.scanner.walk()?;
        let mut packer = Packer::new(self.options.clone(), Arc::clone(&self.tokenizer), store);

        for entry in walk.by_ref() {
            stats.files_processed += 1;

            let Some(unit) = self.load(&entry, &mut stats) else {
                continue;
            };

            if let Some(FlushOutcome::PersistFailed { filename, .. }) = packer.ingest(&unit) {
                warn!("Continuing after losing {}", filename);
            }
        }

        stats.ignored_files = walk.ignored_files();
        stats.ignored_dirs = walk.ignored_dirs();

        let report = packer.finalize();
        stats.records = report.records;
        stats.persist_failures = report.persist_failures;
        stats.elapsed = start_time.elapsed();

        info!(
            "✓ Packed {} files into {} output files in {:.2}s",
            stats.files_processed,
            stats.records.len(),
            stats.elapsed.as_secs_f64()
        );

        Ok(stats)
    }

    /// Reads one file into a unit, or `None` if it is left out.
    fn load(&self, entry: &SourceEntry, stats: &mut RunStatistics) -> Option<SourceUnit> {
        debug!("Processing file: {}", entry.relative_path);

        match read_source(&entry.absolute_path) {
            SourceContent::Text(text) => Some(SourceUnit::text(
                entry.relative_path.as_str(),
                self.obscure(text),
            )),
            SourceContent::NonText { reason } => {
                stats.non_text_files += 1;

                if !self.config.include_non_text_files {
                    warn!("Skipping non-text file {}: {}", entry.relative_path, reason);
                    return None;
                }

                warn!("Non-text file {}: {}", entry.relative_path, reason);
                Some(SourceUnit::non_text(
                    entry.relative_path.as_str(),
                    self.obscure(self.config.non_text_placeholder.clone()),
                ))
            }
        }
    }

    fn obscure(&self, text: String) -> String {
        if self.obscurer.is_empty() {
            text
        } else {
            self.obscurer.apply(&text)
        }
    }
}
