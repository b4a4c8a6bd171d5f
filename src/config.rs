use crate::error::{Error, Result};
use crate::filter::IgnoreRules;
use crate::obscure::Obscurer;
use crate::template::{BlockTemplate, DEFAULT_FILE_TEMPLATE};
use crate::token::TokenizerKind;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default token budget per output file.
pub const DEFAULT_MAX_TOKENS: usize = 200_000;
/// Default separator between blocks in the same output file.
pub const DEFAULT_FILE_SEPARATOR: &str = "\n\n";
/// Default text standing in for unreadable files.
pub const DEFAULT_NON_TEXT_PLACEHOLDER: &str = "non-text file placeholder";

/// Configuration for one packing run.
///
/// Use [`Config::builder()`] to construct a new configuration. A config is
/// immutable for the duration of a run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory to pack
    pub root_dir: PathBuf,

    /// Directory receiving the output files
    pub output_dir: PathBuf,

    /// Prefix for output file names; derived from `root_dir` when unset
    pub root_name: Option<String>,

    /// Token budget per output file
    pub max_tokens: usize,

    /// Block template with `{path}`, `{name}` and `{content}` placeholders
    pub file_template: String,

    /// Text inserted between consecutive blocks of one output file
    pub file_separator: String,

    /// Whether unreadable files are exported as a placeholder block
    pub include_non_text_files: bool,

    /// Placeholder content for unreadable files
    pub non_text_placeholder: String,

    /// Directory names pruned at any depth
    pub ignore_dirs: Vec<String>,

    /// Glob patterns matched against relative file paths
    pub ignore_patterns: Vec<String>,

    /// Words replaced in file content before formatting
    pub obscured_words: BTreeMap<String, String>,

    /// Tokenizer used to measure blocks
    pub tokenizer: TokenizerKind,

    /// Whether `.gitignore` files are honoured during traversal
    pub respect_gitignore: bool,

    /// Dry run mode (no file writes)
    pub dry_run: bool,

    /// Copy an existing output file aside before overwriting it
    pub backup_existing: bool,

    /// Write a JSON run summary next to the output files
    pub write_summary: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use concatext::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir("./src")
    ///     .max_tokens(50_000)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending field if:
    /// - `dir_path` doesn't exist or is not a directory
    /// - `max_tokens` is 0
    /// - `file_template` is empty
    /// - an ignore pattern or obscured word is invalid
    /// - `root_name` is empty or contains a path separator
    /// - `output_dir` exists but is not a directory
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "dir_path does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "dir_path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if self.max_tokens == 0 {
            return Err(Error::config("max_tokens must be greater than 0"));
        }

        BlockTemplate::new(self.file_template.as_str())?;
        IgnoreRules::new(&self.ignore_dirs, &self.ignore_patterns)?;
        Obscurer::new(&self.obscured_words)?;
        self.resolved_root_name()?;

        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(Error::config(format!(
                "output_dir is not a directory: {}",
                self.output_dir.display()
            )));
        }

        if self.dry_run && self.write_summary {
            tracing::warn!("write_summary is ignored in dry run mode");
        }

        Ok(())
    }

    /// Returns the prefix used to name output files.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured name is invalid, or if no name is
    /// configured and the root directory has no final component (e.g. `/`).
    pub fn resolved_root_name(&self) -> Result<String> {
        let name = match &self.root_name {
            Some(name) => name.clone(),
            None => derive_root_name(&self.root_dir)?,
        };

        if name.trim().is_empty() {
            return Err(Error::config("root_name must not be empty"));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(Error::config(format!(
                "root_name must not contain path separators: {name}"
            )));
        }

        Ok(name)
    }
}

fn derive_root_name(root_dir: &Path) -> Result<String> {
    let canonical = root_dir
        .canonicalize()
        .map_err(|e| Error::io(root_dir, e))?;

    canonical
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::config(format!(
                "cannot derive root_name from {}; set root_name explicitly",
                canonical.display()
            ))
        })
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    root_name: Option<String>,
    max_tokens: Option<usize>,
    file_template: Option<String>,
    file_separator: Option<String>,
    include_non_text_files: Option<bool>,
    non_text_placeholder: Option<String>,
    ignore_dirs: Vec<String>,
    ignore_patterns: Vec<String>,
    obscured_words: BTreeMap<String, String>,
    tokenizer: Option<TokenizerKind>,
    respect_gitignore: bool,
    dry_run: bool,
    backup_existing: bool,
    write_summary: bool,
}

impl ConfigBuilder {
    /// Sets the root directory to pack. Required.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the output directory for generated files.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Overrides the output file name prefix.
    #[must_use]
    pub fn root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = Some(name.into());
        self
    }

    /// Sets the token budget per output file.
    #[must_use]
    pub fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets the block template.
    #[must_use]
    pub fn file_template(mut self, template: impl Into<String>) -> Self {
        self.file_template = Some(template.into());
        self
    }

    /// Sets the separator between blocks. May be empty.
    #[must_use]
    pub fn file_separator(mut self, separator: impl Into<String>) -> Self {
        self.file_separator = Some(separator.into());
        self
    }

    /// Enables or disables placeholder blocks for non-text files.
    #[must_use]
    pub fn include_non_text_files(mut self, enabled: bool) -> Self {
        self.include_non_text_files = Some(enabled);
        self
    }

    /// Sets the placeholder content for non-text files.
    #[must_use]
    pub fn non_text_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.non_text_placeholder = Some(placeholder.into());
        self
    }

    /// Sets the directory names to prune.
    #[must_use]
    pub fn ignore_dirs(mut self, dirs: Vec<String>) -> Self {
        self.ignore_dirs = dirs;
        self
    }

    /// Sets the file glob patterns to skip.
    #[must_use]
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Sets the word → placeholder obscuration map.
    #[must_use]
    pub fn obscured_words(mut self, words: BTreeMap<String, String>) -> Self {
        self.obscured_words = words;
        self
    }

    /// Sets the tokenizer implementation.
    #[must_use]
    pub fn tokenizer(mut self, kind: TokenizerKind) -> Self {
        self.tokenizer = Some(kind);
        self
    }

    /// Enables or disables `.gitignore` handling.
    #[must_use]
    pub fn respect_gitignore(mut self, enabled: bool) -> Self {
        self.respect_gitignore = enabled;
        self
    }

    /// Enables dry run mode (no file writes).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables or disables backup creation.
    #[must_use]
    pub fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = enabled;
        self
    }

    /// Enables or disables the JSON run summary.
    #[must_use]
    pub fn write_summary(mut self, enabled: bool) -> Self {
        self.write_summary = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no root directory was given or validation fails.
    pub fn build(self) -> Result<Config> {
        let root_dir = self
            .root_dir
            .ok_or_else(|| Error::config("dir_path not specified"))?;

        let config = Config {
            root_dir,
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            root_name: self.root_name,
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            file_template: self
                .file_template
                .unwrap_or_else(|| DEFAULT_FILE_TEMPLATE.to_string()),
            file_separator: self
                .file_separator
                .unwrap_or_else(|| DEFAULT_FILE_SEPARATOR.to_string()),
            include_non_text_files: self.include_non_text_files.unwrap_or(true),
            non_text_placeholder: self
                .non_text_placeholder
                .unwrap_or_else(|| DEFAULT_NON_TEXT_PLACEHOLDER.to_string()),
            ignore_dirs: self.ignore_dirs,
            ignore_patterns: self.ignore_patterns,
            obscured_words: self.obscured_words,
            tokenizer: self.tokenizer.unwrap_or_default(),
            respect_gitignore: self.respect_gitignore,
            dry_run: self.dry_run,
            backup_existing: self.backup_existing,
            write_summary: self.write_summary,
        };

        config.validate()?;
        Ok(config)
    }
}
