//! Block formatting.
//!
//! A block is the textual form of one source file: the configured template
//! with `{path}`, `{name}` and `{content}` substituted. Substitution is a
//! single left-to-right pass over the template, so text coming from a value
//! (a path containing `{name}`, content containing `{path}`) is never
//! substituted again.

use crate::error::{Error, Result};

/// Default template used when none is configured.
pub const DEFAULT_FILE_TEMPLATE: &str = "===\n{path}\n===\n{content}\n===";

const PATH_PLACEHOLDER: &str = "{path}";
const NAME_PLACEHOLDER: &str = "{name}";
const CONTENT_PLACEHOLDER: &str = "{content}";

/// A validated block template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    source: String,
}

impl BlockTemplate {
    /// Creates a template from its source text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the template is empty. A template
    /// without `{content}` is accepted; every block it produces will just
    /// omit the file body.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(Error::config("file_template must not be empty"));
        }
        Ok(Self { source })
    }

    /// Returns true if blocks will include the file content.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.source.contains(CONTENT_PLACEHOLDER)
    }

    /// Returns the template source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Formats one block.
    #[must_use]
    pub fn format(&self, relative_path: &str, content: &str) -> String {
        format_block(&self.source, relative_path, content)
    }
}

impl Default for BlockTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_FILE_TEMPLATE.to_string(),
        }
    }
}

/// Substitutes `{path}`, `{name}` and `{content}` in `template`.
///
/// `{name}` is the final component of `relative_path`, split on `/` or the
/// platform separator. Unknown placeholders are copied through unchanged.
#[must_use]
pub fn format_block(template: &str, relative_path: &str, content: &str) -> String {
    let name = file_name(relative_path);
    let mut out = String::with_capacity(template.len() + relative_path.len() + content.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        let (value, consumed) = if tail.starts_with(PATH_PLACEHOLDER) {
            (relative_path, PATH_PLACEHOLDER.len())
        } else if tail.starts_with(NAME_PLACEHOLDER) {
            (name, NAME_PLACEHOLDER.len())
        } else if tail.starts_with(CONTENT_PLACEHOLDER) {
            (content, CONTENT_PLACEHOLDER.len())
        } else {
            ("{", 1)
        };

        out.push_str(value);
        rest = &tail[consumed..];
    }

    out.push_str(rest);
    out
}

fn file_name(relative_path: &str) -> &str {
    relative_path
        .rsplit(|c: char| c == '/' || c == std::path::MAIN_SEPARATOR)
        .next()
        .unwrap_or(relative_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template() {
        let block = BlockTemplate::default().format("src/main.rs", "fn main() {}");
        assert_eq!(block, "===\nsrc/main.rs\n===\nfn main() {}\n===");
    }

    #[test]
    fn test_all_placeholders() {
        let block = format_block("<{name} at {path}>\n{content}", "a/b/c.txt", "body");
        assert_eq!(block, "<c.txt at a/b/c.txt>\nbody");
    }

    #[test]
    fn test_repeated_placeholders() {
        let block = format_block("{name}|{name}|{path}", "x/y.rs", "");
        assert_eq!(block, "y.rs|y.rs|x/y.rs");
    }

    #[test]
    fn test_unknown_placeholders_untouched() {
        let block = format_block("{size} {path} {", "f.rs", "c");
        assert_eq!(block, "{size} f.rs {");
    }

    #[test]
    fn test_content_is_not_rescanned() {
        let block = format_block("{path}:{content}", "f.rs", "let s = \"{path} {name}\";");
        assert_eq!(block, "f.rs:let s = \"{path} {name}\";");
    }

    #[test]
    fn test_path_is_not_rescanned() {
        let block = format_block("{path}/{name}", "dir/{name}", "");
        assert_eq!(block, "dir/{name}/{name}");
    }

    #[test]
    fn test_name_of_top_level_file() {
        assert_eq!(file_name("README.md"), "README.md");
        assert_eq!(file_name("docs/guide/intro.md"), "intro.md");
    }

    #[test]
    fn test_empty_template_rejected() {
        assert!(BlockTemplate::new("").unwrap_err().is_config());
        assert!(BlockTemplate::new("  \n").is_err());
    }

    #[test]
    fn test_template_without_content_accepted() {
        let template = BlockTemplate::new("# {path}").unwrap();
        assert!(!template.has_content());
        assert!(BlockTemplate::default().has_content());
        assert_eq!(template.format("a.rs", "ignored"), "# a.rs");
    }
}
