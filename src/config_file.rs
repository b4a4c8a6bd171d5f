//! YAML configuration file support.
//!
//! The file uses the familiar `config.yaml` keys
//! (`dir_path`, `max_tokens`, `file_template`, ...). Every key is optional;
//! unknown keys are ignored so files written by other front-ends still load.

use crate::config::ConfigBuilder;
use crate::error::{Error, Result};
use crate::token::TokenizerKind;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Raw contents of a configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct FileConfig {
    /// Root directory to pack
    pub dir_path: Option<PathBuf>,
    /// Output directory
    pub output_dir: Option<PathBuf>,
    /// Output file name prefix
    pub root_name: Option<String>,
    /// Token budget; signed so negative values get a clear error
    pub max_tokens: Option<i64>,
    /// Directory names to prune
    pub ignore_dirs: Option<Vec<String>>,
    /// File glob patterns to skip
    pub ignore_patterns: Option<Vec<String>>,
    /// Block template
    pub file_template: Option<String>,
    /// Separator between blocks
    pub file_separator: Option<String>,
    /// Whether non-text files get a placeholder block
    pub include_non_text_files: Option<bool>,
    /// Placeholder for non-text files
    pub non_text_file_placeholder: Option<String>,
    /// Word → placeholder obscuration map
    pub obscured_words: Option<BTreeMap<String, String>>,
    /// Tokenizer strategy
    pub tokenizer: Option<TokenizerKind>,
    /// Whether `.gitignore` files are honoured
    pub respect_gitignore: Option<bool>,
    /// Whether existing outputs are backed up
    pub backup_existing: Option<bool>,
}

impl FileConfig {
    /// Loads and parses a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or
    /// [`Error::ConfigFile`] if it is not valid YAML for this schema.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::parse(&text).map_err(|e| match e {
            Error::Config { message } => Error::config_file(path, message),
            other => other,
        })?;
        tracing::info!("Configuration loaded from '{}'", path.display());
        Ok(config)
    }

    /// Parses YAML text. An empty document yields all defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the parse failure.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Applies every key present in the file to `builder`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max_tokens` is not positive.
    pub fn apply(self, mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
        if let Some(dir) = self.dir_path {
            builder = builder.root_dir(dir);
        }
        if let Some(dir) = self.output_dir {
            builder = builder.output_dir(dir);
        }
        if let Some(name) = self.root_name {
            builder = builder.root_name(name);
        }
        if let Some(max_tokens) = self.max_tokens {
            let max_tokens = usize::try_from(max_tokens)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| {
                    Error::config(format!("max_tokens must be greater than 0 (got {max_tokens})"))
                })?;
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(dirs) = self.ignore_dirs {
            builder = builder.ignore_dirs(dirs);
        }
        if let Some(patterns) = self.ignore_patterns {
            builder = builder.ignore_patterns(patterns);
        }
        if let Some(template) = self.file_template {
            builder = builder.file_template(template);
        }
        if let Some(separator) = self.file_separator {
            builder = builder.file_separator(separator);
        }
        if let Some(include) = self.include_non_text_files {
            builder = builder.include_non_text_files(include);
        }
        if let Some(placeholder) = self.non_text_file_placeholder {
            builder = builder.non_text_placeholder(placeholder);
        }
        if let Some(words) = self.obscured_words {
            builder = builder.obscured_words(words);
        }
        if let Some(kind) = self.tokenizer {
            builder = builder.tokenizer(kind);
        }
        if let Some(enabled) = self.respect_gitignore {
            builder = builder.respect_gitignore(enabled);
        }
        if let Some(enabled) = self.backup_existing {
            builder = builder.backup_existing(enabled);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use assert_fs::prelude::*;

    #[test]
    fn test_parse_full_file() {
        let yaml = r###"
dir_path: "./project"
output_dir: "./out"
max_tokens: 1000
ignore_dirs: [".git", "node_modules"]
ignore_patterns: ["*.lock"]
file_template: "## {path}\n{content}"
file_separator: "\n---\n"
include_non_text_files: false
non_text_file_placeholder: "<binary>"
obscured_words:
  acme: "[COMPANY]"
tokenizer: simple
respect_gitignore: true
"###;
        let config = FileConfig::parse(yaml).unwrap();
        assert_eq!(config.dir_path, Some(PathBuf::from("./project")));
        assert_eq!(config.max_tokens, Some(1000));
        assert_eq!(config.ignore_dirs.as_deref(), Some(&[".git".to_string(), "node_modules".to_string()][..]));
        assert_eq!(config.file_template.as_deref(), Some("## {path}\n{content}"));
        assert_eq!(config.file_separator.as_deref(), Some("\n---\n"));
        assert_eq!(config.include_non_text_files, Some(false));
        assert_eq!(config.tokenizer, Some(TokenizerKind::Simple));
        assert_eq!(config.respect_gitignore, Some(true));
        assert_eq!(
            config.obscured_words.unwrap().get("acme").map(String::as_str),
            Some("[COMPANY]")
        );
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config = FileConfig::parse("max_tokens: 5\nwindow_geometry: 800x600\n").unwrap();
        assert_eq!(config.max_tokens, Some(5));
    }

    #[test]
    fn test_empty_document() {
        let config = FileConfig::parse("").unwrap();
        assert!(config.dir_path.is_none());
        assert!(config.max_tokens.is_none());
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(FileConfig::parse("max_tokens: [unterminated").is_err());
        let err = FileConfig::parse("max_tokens: lots").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_apply_builds_config() {
        let temp = assert_fs::TempDir::new().unwrap();
        let yaml = format!(
            "dir_path: '{}'\nmax_tokens: 42\nfile_separator: ''\n",
            temp.path().display()
        );
        let builder = FileConfig::parse(&yaml)
            .unwrap()
            .apply(Config::builder())
            .unwrap();
        let config = builder.build().unwrap();

        assert_eq!(config.root_dir, temp.path());
        assert_eq!(config.max_tokens, 42);
        assert_eq!(config.file_separator, "");
    }

    #[test]
    fn test_negative_budget_rejected() {
        let err = FileConfig::parse("max_tokens: -5")
            .unwrap()
            .apply(Config::builder())
            .unwrap_err();
        assert!(err.to_string().contains("max_tokens must be greater than 0 (got -5)"));
    }

    #[test]
    fn test_load_reports_path() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("config.yaml");
        file.write_str("max_tokens: {").unwrap();

        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigFile { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let err = FileConfig::load(&temp.path().join("missing.yaml")).unwrap_err();
        assert!(err.is_io());
    }
}
