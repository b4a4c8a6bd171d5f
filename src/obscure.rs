//! Whole-word text obscuration.

use crate::error::{Error, Result};
use regex::{NoExpand, Regex};
use std::collections::BTreeMap;

/// Replaces configured words in file content before it is formatted.
///
/// Matching is whole-word and case-insensitive. Rules run in lexicographic
/// order of the word, each over the output of the previous one.
#[derive(Debug, Clone, Default)]
pub struct Obscurer {
    rules: Vec<(Regex, String)>,
}

impl Obscurer {
    /// Compiles the word → placeholder map.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty word.
    pub fn new(words: &BTreeMap<String, String>) -> Result<Self> {
        let mut rules = Vec::with_capacity(words.len());

        for (word, placeholder) in words {
            if word.trim().is_empty() {
                return Err(Error::config("obscured_words contains an empty word"));
            }
            let pattern = format!(r"(?i)\b{}\b", regex::escape(word));
            let regex = Regex::new(&pattern).map_err(|e| {
                Error::config(format!("obscured_words entry '{word}' is invalid: {e}"))
            })?;
            rules.push((regex, placeholder.clone()));
        }

        Ok(Self { rules })
    }

    /// Returns true if no words are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies every rule to `text`.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (regex, placeholder) in &self.rules {
            if regex.is_match(&out) {
                out = regex.replace_all(&out, NoExpand(placeholder)).into_owned();
            }
        }
        out
    }
}
