use crate::error::{Error, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

const SIMPLE_CHARS_PER_TOKEN: usize = 4;
const ENHANCED_WORD_MULTIPLIER: f64 = 1.3;
const ENHANCED_SPECIAL_DIVISOR: usize = 10;

static CL100K: OnceCell<CoreBPE> = OnceCell::new();

/// Type of tokenizer to use for measuring blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    /// Simple character-based tokenizer (~4 chars per token)
    Simple,
    /// Enhanced tokenizer with word and special character analysis
    Enhanced,
    /// Word-level tokenizer: words and punctuation marks count separately
    #[default]
    Words,
    /// OpenAI `cl100k_base` byte-pair encoding
    Tiktoken,
}

impl TokenizerKind {
    /// Creates a new tokenizer instance of this kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the BPE tables for [`TokenizerKind::Tiktoken`]
    /// cannot be loaded.
    pub fn create(self) -> Result<Arc<dyn TokenEstimator>> {
        Ok(match self {
            Self::Simple => Arc::new(SimpleTokenizer),
            Self::Enhanced => Arc::new(EnhancedTokenizer),
            Self::Words => Arc::new(WordTokenizer),
            Self::Tiktoken => Arc::new(TiktokenTokenizer::new()?),
        })
    }
}

/// Counts tokens in text.
///
/// Implementations must be deterministic: the packer measures each block
/// once and caches the separator cost, so the same text has to yield the
/// same count every time.
pub trait TokenEstimator: Send + Sync {
    /// Returns the number of tokens in the given text (0 for empty text).
    fn estimate(&self, text: &str) -> usize;
}

/// Simple character-based tokenizer.
///
/// Uses a heuristic of approximately 4 characters per token,
/// which works reasonably well for source code.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SimpleTokenizer;

impl TokenEstimator for SimpleTokenizer {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let char_count = text.chars().count();
        char_count
            .saturating_add(SIMPLE_CHARS_PER_TOKEN - 1)
            .saturating_div(SIMPLE_CHARS_PER_TOKEN)
            .max(1)
    }
}

/// Enhanced tokenizer with multiple heuristics.
///
/// This tokenizer considers:
/// - Word count (weighted by 1.3)
/// - Character count (divided by 4)
/// - Special characters (penalty factor)
#[derive(Debug, Clone, Copy)]
pub(crate) struct EnhancedTokenizer;

impl TokenEstimator for EnhancedTokenizer {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let words = count_words(text);
        let chars = text.chars().count();
        let special_chars = count_special_chars(text);

        let words = f64::from(u32::try_from(words).unwrap_or(u32::MAX));
        let word_estimate = (words * ENHANCED_WORD_MULTIPLIER) as usize;
        let char_estimate = chars.saturating_div(SIMPLE_CHARS_PER_TOKEN);
        let special_penalty = special_chars.saturating_div(ENHANCED_SPECIAL_DIVISOR);

        let base_estimate = word_estimate
            .saturating_add(char_estimate)
            .saturating_div(2);

        base_estimate.saturating_add(special_penalty).max(1)
    }
}

/// Word-level tokenizer.
///
/// Every maximal run of alphanumeric characters (and `_`) is one token and
/// every other non-whitespace character is a token of its own, so
/// `"fn main() {}"` counts as 6.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WordTokenizer;

impl TokenEstimator for WordTokenizer {
    fn estimate(&self, text: &str) -> usize {
        let mut tokens = 0usize;
        let mut in_word = false;

        for c in text.chars() {
            if c.is_alphanumeric() || c == '_' {
                if !in_word {
                    tokens += 1;
                    in_word = true;
                }
            } else {
                in_word = false;
                if !c.is_whitespace() {
                    tokens += 1;
                }
            }
        }

        tokens
    }
}

/// Byte-pair encoding tokenizer using `cl100k_base`.
///
/// The encoding tables are built once per process and shared by every
/// instance.
pub(crate) struct TiktokenTokenizer {
    bpe: &'static CoreBPE,
}

impl TiktokenTokenizer {
    pub(crate) fn new() -> Result<Self> {
        let bpe = CL100K.get_or_try_init(|| {
            tiktoken_rs::cl100k_base().map_err(|e| Error::tokenizer(e.to_string()))
        })?;
        Ok(Self { bpe })
    }
}

impl TokenEstimator for TiktokenTokenizer {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Counts words in text (whitespace-separated).
#[inline]
fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Counts special (non-alphanumeric) characters.
#[inline]
fn count_special_chars(text: &str) -> usize {
    text.chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_tokenizer_empty() {
        assert_eq!(SimpleTokenizer.estimate(""), 0);
    }

    #[test]
    fn test_simple_tokenizer_basic() {
        let tokenizer = SimpleTokenizer;
        assert_eq!(tokenizer.estimate("test"), 1);
        assert_eq!(tokenizer.estimate("hello world"), 3);
        assert_eq!(tokenizer.estimate(&"a".repeat(1000)), 250);
    }

    #[test]
    fn test_enhanced_tokenizer_code() {
        let tokenizer = EnhancedTokenizer;
        assert_eq!(tokenizer.estimate(""), 0);

        let code = r#"
            fn main() {
                println!("Hello, world!");
            }
        "#;
        let result = tokenizer.estimate(code);
        assert!(result > 5);
        assert!(result < 30);
    }

    #[test]
    fn test_word_tokenizer_counts_words_and_punctuation() {
        let tokenizer = WordTokenizer;
        assert_eq!(tokenizer.estimate(""), 0);
        assert_eq!(tokenizer.estimate("   \n\t"), 0);
        assert_eq!(tokenizer.estimate("hello world"), 2);
        assert_eq!(tokenizer.estimate("fn main() {}"), 6);
        assert_eq!(tokenizer.estimate("snake_case_name"), 1);
        assert_eq!(tokenizer.estimate("===\nsrc/lib.rs\n==="), 11);
    }

    #[test]
    fn test_word_tokenizer_separator_cost() {
        // The default separator is whitespace only and therefore free.
        assert_eq!(WordTokenizer.estimate("\n\n"), 0);
        assert_eq!(WordTokenizer.estimate("\n---\n"), 3);
    }

    #[test]
    fn test_tiktoken_tokenizer() {
        let tokenizer = TokenizerKind::Tiktoken.create().unwrap();
        assert_eq!(tokenizer.estimate(""), 0);
        assert_eq!(tokenizer.estimate("hello world"), 2);
    }

    #[test]
    fn test_kind_deserializes_lowercase() {
        let kind: TokenizerKind = serde_json::from_str("\"enhanced\"").unwrap();
        assert_eq!(kind, TokenizerKind::Enhanced);
        assert_eq!(TokenizerKind::default(), TokenizerKind::Words);
    }

    #[test]
    fn test_count_special_chars() {
        assert_eq!(count_special_chars("hello"), 0);
        assert_eq!(count_special_chars("hello!"), 1);
        assert_eq!(count_special_chars("fn main() {}"), 4);
    }
}
