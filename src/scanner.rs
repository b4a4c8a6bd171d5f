use crate::{
    config::Config,
    error::{Error, Result},
    file::SourceEntry,
    filter::IgnoreRules,
};
use ignore::{DirEntry, Walk, WalkBuilder};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tracing::{debug, info, trace, warn};

/// Walks the root directory in a deterministic order.
pub(crate) struct Scanner {
    root_dir: PathBuf,
    output_dir: PathBuf,
    artifacts: Regex,
    respect_gitignore: bool,
    rules: IgnoreRules,
}

impl Scanner {
    /// Creates a new scanner from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the ignore patterns do not compile or the root
    /// name cannot be resolved.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            root_dir: config.root_dir.clone(),
            output_dir: config.output_dir.clone(),
            artifacts: artifact_pattern(&config.resolved_root_name()?)?,
            respect_gitignore: config.respect_gitignore,
            rules: IgnoreRules::new(&config.ignore_dirs, &config.ignore_patterns)?,
        })
    }

    /// Starts a walk over the root directory.
    ///
    /// Entries at every level are visited in file-name order, so the same
    /// tree always yields the same sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be resolved.
    pub(crate) fn walk(&self) -> Result<SourceWalk> {
        let root = self
            .root_dir
            .canonicalize()
            .map_err(|e| Error::io(&self.root_dir, e))?;
        // The output directory only needs pruning when it already exists.
        let output = OwnOutput {
            dir: self.output_dir.canonicalize().ok(),
            artifacts: self.artifacts.clone(),
        };
        let ignored_dirs = Arc::new(AtomicUsize::new(0));

        debug!("Starting scan of {}", root.display());

        let mut builder = WalkBuilder::new(&root);
        builder
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        let rules = self.rules.clone();
        let counter = Arc::clone(&ignored_dirs);
        let filter_root = root.clone();
        builder.filter_entry(move |entry| {
            keep_entry(entry, &filter_root, &output, &rules, &counter)
        });

        Ok(SourceWalk {
            inner: builder.build(),
            root,
            rules: self.rules.clone(),
            ignored_dirs,
            ignored_files: 0,
        })
    }
}

/// Matches the names a run writes into its output directory: numbered
/// artifacts, their temp files and backups, and the JSON summary.
fn artifact_pattern(root_name: &str) -> Result<Regex> {
    let pattern = format!(
        r"^{}_(?:\d+\.(?:txt|tmp)|summary\.json)(?:\.backup\.\d+)?$",
        regex::escape(root_name)
    );
    Regex::new(&pattern).map_err(|e| Error::invalid_pattern(pattern, e.to_string()))
}

/// Where this run's own output lives.
struct OwnOutput {
    dir: Option<PathBuf>,
    artifacts: Regex,
}

impl OwnOutput {
    fn is_output_dir(&self, path: &Path) -> bool {
        self.dir.as_deref() == Some(path)
    }

    /// True for a previous run's output file lying directly in the output
    /// directory. Only reachable when that directory is the root itself,
    /// since a nested output directory is pruned whole.
    fn is_artifact(&self, entry: &DirEntry) -> bool {
        entry.path().parent().is_some_and(|parent| self.is_output_dir(parent))
            && self
                .artifacts
                .is_match(&entry.file_name().to_string_lossy())
    }
}

/// Decides whether the walker descends into / yields an entry.
fn keep_entry(
    entry: &DirEntry,
    root: &Path,
    output: &OwnOutput,
    rules: &IgnoreRules,
    ignored_dirs: &AtomicUsize,
) -> bool {
    if entry.depth() == 0 {
        return true;
    }

    if !entry.file_type().is_some_and(|ft| ft.is_dir()) {
        if output.is_artifact(entry) {
            debug!("Skipping previous output: {}", entry.path().display());
            return false;
        }
        return true;
    }

    if output.is_output_dir(entry.path()) {
        debug!("Skipping output directory: {}", entry.path().display());
        return false;
    }

    let name = entry.file_name().to_string_lossy();
    if rules.is_ignored_dir(&name) {
        info!("Ignoring directory: {}", relative_path(entry.path(), root));
        ignored_dirs.fetch_add(1, Ordering::Relaxed);
        return false;
    }

    true
}

/// Returns `path` relative to `root`, joined with `/` on every platform.
pub(crate) fn relative_path(path: &Path, root: &Path) -> String {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Iterator over the files of one walk.
///
/// Ignored files and directories are skipped and counted; the counts are
/// complete once the iterator is exhausted.
pub(crate) struct SourceWalk {
    inner: Walk,
    root: PathBuf,
    rules: IgnoreRules,
    ignored_dirs: Arc<AtomicUsize>,
    ignored_files: usize,
}

impl SourceWalk {
    /// Number of files skipped by an ignore pattern so far.
    pub(crate) const fn ignored_files(&self) -> usize {
        self.ignored_files
    }

    /// Number of directories pruned by name so far.
    pub(crate) fn ignored_dirs(&self) -> usize {
        self.ignored_dirs.load(Ordering::Relaxed)
    }
}

impl Iterator for SourceWalk {
    type Item = SourceEntry;

    fn next(&mut self) -> Option<SourceEntry> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    continue;
                }
            };

            if !is_file(&entry) {
                continue;
            }

            let relative = relative_path(entry.path(), &self.root);
            if self.rules.is_ignored_file(&relative) {
                info!("Ignoring file: {}", relative);
                self.ignored_files += 1;
                continue;
            }

            trace!("Found file: {}", relative);
            return Some(SourceEntry {
                absolute_path: entry.into_path(),
                relative_path: relative,
            });
        }
    }
}

fn is_file(entry: &DirEntry) -> bool {
    match entry.file_type() {
        Some(ft) if ft.is_file() => true,
        // Symlinks are not traversed, but a link to a regular file is read
        // through like any other file.
        Some(ft) if ft.is_symlink() => entry.path().is_file(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn scanner(root: &Path, configure: impl FnOnce(crate::ConfigBuilder) -> crate::ConfigBuilder) -> Scanner {
        let builder = Config::builder()
            .root_dir(root)
            .output_dir(root.join("out"));
        Scanner::new(&configure(builder).build().unwrap()).unwrap()
    }

    fn collect(walk: SourceWalk) -> Vec<String> {
        walk.map(|e| e.relative_path).collect()
    }

    #[test]
    fn test_scanner_finds_files_in_sorted_order() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b.rs").write_str("b").unwrap();
        temp.child("a.rs").write_str("a").unwrap();
        temp.child("src/main.rs").write_str("fn main() {}").unwrap();
        temp.child("src/lib.rs").write_str("pub fn f() {}").unwrap();
        temp.child("tests/it.rs").write_str("#[test]\nfn t() {}").unwrap();

        let files = collect(scanner(temp.path(), |b| b).walk().unwrap());

        assert_eq!(
            files,
            vec!["a.rs", "b.rs", "src/lib.rs", "src/main.rs", "tests/it.rs"]
        );
    }

    #[test]
    fn test_scanner_includes_hidden_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".env").write_str("KEY=1").unwrap();
        temp.child("visible.txt").write_str("x").unwrap();

        let files = collect(scanner(temp.path(), |b| b).walk().unwrap());
        assert_eq!(files, vec![".env", "visible.txt"]);
    }

    #[test]
    fn test_scanner_prunes_ignored_dirs() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main.rs").write_str("fn main() {}").unwrap();
        temp.child("target/debug/app").write_str("bin").unwrap();
        temp.child("src/target/nested.rs").write_str("x").unwrap();
        temp.child("node_modules/pkg/index.js").write_str("x").unwrap();

        let mut walk = scanner(temp.path(), |b| {
            b.ignore_dirs(vec!["target".to_string(), "node_modules".to_string()])
        })
        .walk()
        .unwrap();
        let files: Vec<String> = walk.by_ref().map(|e| e.relative_path).collect();

        assert_eq!(files, vec!["src/main.rs"]);
        assert_eq!(walk.ignored_dirs(), 3);
        assert_eq!(walk.ignored_files(), 0);
    }

    #[test]
    fn test_scanner_counts_ignored_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("Cargo.lock").write_str("x").unwrap();
        temp.child("app.log").write_str("x").unwrap();
        temp.child("logs/old.log").write_str("x").unwrap();
        temp.child("main.rs").write_str("x").unwrap();

        let mut walk = scanner(temp.path(), |b| {
            b.ignore_patterns(vec!["*.log".to_string(), "Cargo.lock".to_string()])
        })
        .walk()
        .unwrap();
        let files: Vec<String> = walk.by_ref().map(|e| e.relative_path).collect();

        assert_eq!(files, vec!["main.rs"]);
        assert_eq!(walk.ignored_files(), 3);
    }

    #[test]
    fn test_scanner_skips_output_dir_inside_root() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.rs").write_str("x").unwrap();
        temp.child("out/root_01.txt").write_str("old output").unwrap();

        let mut walk = scanner(temp.path(), |b| b).walk().unwrap();
        let files: Vec<String> = walk.by_ref().map(|e| e.relative_path).collect();

        assert_eq!(files, vec!["main.rs"]);
        assert_eq!(walk.ignored_dirs(), 0);
    }

    #[test]
    fn test_scanner_skips_previous_output_in_root() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.rs").write_str("x").unwrap();
        temp.child("pack_01.txt").write_str("old").unwrap();
        temp.child("pack_02.tmp").write_str("partial").unwrap();
        temp.child("pack_01.txt.backup.42").write_str("older").unwrap();
        temp.child("pack_summary.json").write_str("{}").unwrap();
        temp.child("pack_notes.txt").write_str("kept").unwrap();
        temp.child("sub/pack_01.txt").write_str("kept").unwrap();

        let mut walk = scanner(temp.path(), |b| b.output_dir(temp.path()).root_name("pack"))
            .walk()
            .unwrap();
        let files: Vec<String> = walk.by_ref().map(|e| e.relative_path).collect();

        assert_eq!(files, vec!["main.rs", "pack_notes.txt", "sub/pack_01.txt"]);
        assert_eq!(walk.ignored_files(), 0);
    }

    #[test]
    fn test_artifact_pattern_escapes_root_name() {
        let pattern = artifact_pattern("a.b").unwrap();
        assert!(pattern.is_match("a.b_01.txt"));
        assert!(pattern.is_match("a.b_100.txt"));
        assert!(!pattern.is_match("axb_01.txt"));
        assert!(!pattern.is_match("a.b_01.txt.bak"));
    }

    #[test]
    fn test_scanner_gitignore_only_when_enabled() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".gitignore").write_str("ignored.rs\n").unwrap();
        temp.child("included.rs").write_str("fn main() {}").unwrap();
        temp.child("ignored.rs").write_str("fn test() {}").unwrap();

        let files = collect(scanner(temp.path(), |b| b).walk().unwrap());
        assert_eq!(files, vec![".gitignore", "ignored.rs", "included.rs"]);

        let files = collect(scanner(temp.path(), |b| b.respect_gitignore(true)).walk().unwrap());
        assert_eq!(files, vec![".gitignore", "included.rs"]);
    }

    #[test]
    fn test_scanner_empty_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let files = collect(scanner(temp.path(), |b| b).walk().unwrap());
        assert!(files.is_empty());
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Path::new("/project");
        let path = root.join("src").join("deep").join("mod.rs");
        assert_eq!(relative_path(&path, root), "src/deep/mod.rs");
    }
}
