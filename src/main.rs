use anyhow::{bail, Context};
use clap::Parser;
use concatext::{Config, FileConfig, Pipeline, TokenizerKind, DEFAULT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "concatext",
    version,
    author,
    about = "Pack a directory tree into token-bounded text files",
    long_about = "Pack a directory tree into token-bounded text files.\n\n\
    Every file under DIR is formatted into a block (path plus content) and the \
    blocks are written, in file-name order, into DIRNAME_01.txt, DIRNAME_02.txt, ... \
    so that no output file exceeds the token budget. Settings are read from \
    ./config.yaml when present; command-line flags take precedence.\n\n\
    USAGE EXAMPLES:\n  \
      # Pack the directory named in ./config.yaml\n  \
      concatext\n\n  \
      # Pack a project into ./export with a 50k token budget\n  \
      concatext ./my-project --out ./export --max-tokens 50000\n\n  \
      # Skip build output and lock files, count with tiktoken\n  \
      concatext ./app --ignore-dir target --ignore-pattern '*.lock' --tokenizer tiktoken"
)]
struct Cli {
    /// Directory to pack (overrides `dir_path` from the config file)
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,

    /// YAML configuration file [default: ./config.yaml if present]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory for the packed files
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Max tokens per output file
    #[arg(long, value_name = "N")]
    max_tokens: Option<usize>,

    /// Tokenizer to use
    #[arg(long, value_enum)]
    tokenizer: Option<CliTokenizer>,

    /// Block template; `{path}`, `{name}` and `{content}` are substituted
    ///
    /// The escapes \n, \t and \\ are expanded.
    #[arg(long, value_name = "TEMPLATE")]
    template: Option<String>,

    /// Separator between blocks in one output file (escapes expanded)
    #[arg(long, value_name = "TEXT")]
    separator: Option<String>,

    /// Content used for files that are not valid UTF-8
    #[arg(long, value_name = "TEXT")]
    placeholder: Option<String>,

    /// Leave non-text files out instead of using the placeholder
    #[arg(long)]
    exclude_non_text: bool,

    /// Directory name to skip at any depth (repeatable)
    #[arg(long = "ignore-dir", value_name = "NAME")]
    ignore_dirs: Vec<String>,

    /// Glob matched against relative file paths (repeatable)
    #[arg(long = "ignore-pattern", value_name = "GLOB")]
    ignore_patterns: Vec<String>,

    /// Honour .gitignore files
    #[arg(long)]
    respect_gitignore: bool,

    /// Prefix for output file names [default: name of DIR]
    #[arg(long, value_name = "NAME")]
    root_name: Option<String>,

    /// Copy existing output files aside before overwriting them
    #[arg(long)]
    backup: bool,

    /// Write DIRNAME_summary.json next to the output files
    #[arg(long)]
    summary_json: bool,

    /// Dry run (don't write files)
    #[arg(long)]
    dry_run: bool,

    /// Only log warnings and errors; don't print the summary
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliTokenizer {
    /// ~4 characters per token
    Simple,
    /// Blend of word, character and symbol counts
    Enhanced,
    /// Words and punctuation marks
    Words,
    /// OpenAI cl100k_base
    Tiktoken,
}

impl From<CliTokenizer> for TokenizerKind {
    fn from(t: CliTokenizer) -> Self {
        match t {
            CliTokenizer::Simple => Self::Simple,
            CliTokenizer::Enhanced => Self::Enhanced,
            CliTokenizer::Words => Self::Words,
            CliTokenizer::Tiktoken => Self::Tiktoken,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose, cli.quiet)?;

    let config = build_config(&cli).context("Failed to build configuration")?;
    let quiet = cli.quiet;

    let stats = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Pipeline execution failed")?;

    if !quiet {
        print!("{}", stats.render_summary());
    }

    if !stats.is_complete() {
        bail!(
            "{} output file(s) could not be written",
            stats.persist_failures.len()
        );
    }

    Ok(())
}

/// Layers the command line over the configuration file.
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut file = load_file_config(cli.config.as_deref())?;

    // List flags extend the file's lists rather than replacing them.
    if !cli.ignore_dirs.is_empty() {
        file.ignore_dirs
            .get_or_insert_with(Vec::new)
            .extend(cli.ignore_dirs.iter().cloned());
    }
    if !cli.ignore_patterns.is_empty() {
        file.ignore_patterns
            .get_or_insert_with(Vec::new)
            .extend(cli.ignore_patterns.iter().cloned());
    }

    let mut builder = file.apply(Config::builder())?;

    if let Some(dir) = &cli.dir {
        builder = builder.root_dir(dir);
    }
    if let Some(out) = &cli.out {
        builder = builder.output_dir(out);
    }
    if let Some(max_tokens) = cli.max_tokens {
        builder = builder.max_tokens(max_tokens);
    }
    if let Some(tokenizer) = cli.tokenizer {
        builder = builder.tokenizer(tokenizer.into());
    }
    if let Some(template) = &cli.template {
        builder = builder.file_template(unescape(template));
    }
    if let Some(separator) = &cli.separator {
        builder = builder.file_separator(unescape(separator));
    }
    if let Some(placeholder) = &cli.placeholder {
        builder = builder.non_text_placeholder(placeholder.as_str());
    }
    if let Some(name) = &cli.root_name {
        builder = builder.root_name(name.as_str());
    }
    if cli.exclude_non_text {
        builder = builder.include_non_text_files(false);
    }
    if cli.respect_gitignore {
        builder = builder.respect_gitignore(true);
    }
    if cli.backup {
        builder = builder.backup_existing(true);
    }

    let config = builder
        .dry_run(cli.dry_run)
        .write_summary(cli.summary_json)
        .build()?;

    Ok(config)
}

/// Loads the explicit config file, or `./config.yaml` if it exists.
fn load_file_config(path: Option<&Path>) -> anyhow::Result<FileConfig> {
    if let Some(path) = path {
        return Ok(FileConfig::load(path)?);
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.is_file() {
        return Ok(FileConfig::load(default_path)?);
    }

    tracing::debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
    Ok(FileConfig::default())
}

/// Expands `\n`, `\t` and `\\` typed on the command line.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn setup_tracing(verbosity: u8, quiet: bool) -> anyhow::Result<()> {
    let default_directive = match (quiet, verbosity) {
        (true, _) => "concatext=warn",
        (false, 0) => "concatext=info",
        (false, 1) => "concatext=debug",
        (false, _) => "concatext=trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .context("Invalid log filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\nb"), "a\nb");
        assert_eq!(unescape(r"\t|\\|\x"), "\t|\\|\\x");
        assert_eq!(unescape(r"trailing\"), "trailing\\");
        assert_eq!(unescape("plain"), "plain");
    }

    #[test]
    fn test_cli_parses_repeatable_flags() {
        let cli = Cli::try_parse_from([
            "concatext",
            "./project",
            "--ignore-dir",
            "target",
            "--ignore-dir",
            ".git",
            "--ignore-pattern",
            "*.lock",
            "--tokenizer",
            "tiktoken",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.dir, Some(PathBuf::from("./project")));
        assert_eq!(cli.ignore_dirs, vec!["target", ".git"]);
        assert_eq!(cli.ignore_patterns, vec!["*.lock"]);
        assert!(matches!(cli.tokenizer, Some(CliTokenizer::Tiktoken)));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["concatext", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_cli_overrides_file_config() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config_path = temp.path().join("config.yaml");
        std::fs::write(
            &config_path,
            format!(
                "dir_path: '{}'\nmax_tokens: 10\nignore_dirs: [node_modules]\n",
                temp.path().display()
            ),
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "concatext",
            "--config",
            config_path.to_str().unwrap(),
            "--max-tokens",
            "500",
            "--ignore-dir",
            "target",
            "--separator",
            r"\n---\n",
        ])
        .unwrap();
        let config = build_config(&cli).unwrap();

        assert_eq!(config.root_dir, temp.path());
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.ignore_dirs, vec!["node_modules", "target"]);
        assert_eq!(config.file_separator, "\n---\n");
    }
}
