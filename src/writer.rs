use crate::{
    config::Config,
    error::{Error, Result},
    stats::RunStatistics,
};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, info};

/// Destination for packed output artifacts.
///
/// The packer hands every flushed buffer to a store exactly once, in
/// rotation order. A store that fails returns an error; the packer records
/// the failure and carries on with the next buffer.
pub trait ArtifactStore {
    /// Persists `content` under `name` and returns the number of bytes stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact could not be stored.
    fn persist(&mut self, name: &str, content: &str) -> Result<u64>;
}

/// Writes artifacts into a directory with atomic operations.
#[derive(Debug)]
pub struct FsStore {
    output_dir: PathBuf,
    backup_existing: bool,
}

impl FsStore {
    /// Creates a store writing into `output_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created.
    pub fn new(output_dir: impl Into<PathBuf>, backup_existing: bool) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|e| Error::io(&output_dir, e))?;

        Ok(Self {
            output_dir,
            backup_existing,
        })
    }

    /// Creates a store from configuration.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the output directory cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.output_dir, config.backup_existing)
    }

    /// Directory receiving the artifacts.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes a file atomically with optional backup.
    ///
    /// # Process
    ///
    /// 1. Creates backup if file exists and backup is enabled
    /// 2. Writes content to temporary file
    /// 3. Syncs temporary file to disk
    /// 4. Atomically renames temporary file to target path
    fn write_file_atomic(&self, path: &Path, content: &str) -> Result<()> {
        if path.exists() && self.backup_existing {
            backup_file(path)?;
        }

        let temp_path = path.with_extension("tmp");
        let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

        let written = temp_file
            .write_all(content.as_bytes())
            .and_then(|()| temp_file.sync_all());
        drop(temp_file);

        if let Err(e) = written {
            // Best effort; the write error is reported.
            let _ = fs::remove_file(&temp_path);
            return Err(Error::io(&temp_path, e));
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::io(path, e)
        })
    }
}

impl ArtifactStore for FsStore {
    fn persist(&mut self, name: &str, content: &str) -> Result<u64> {
        let path = self.output_dir.join(name);
        self.write_file_atomic(&path, content)?;

        let size = fs::metadata(&path).map_err(|e| Error::io(&path, e))?.len();
        debug!("Wrote {} ({} bytes)", path.display(), size);
        Ok(size)
    }
}

/// Creates a timestamped copy of an existing file next to it.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)?
        .as_nanos();

    let filename = path
        .file_name()
        .ok_or_else(|| Error::config("Invalid file path"))?
        .to_string_lossy();

    let backup_path = path.with_file_name(format!("{filename}.backup.{timestamp}"));

    fs::copy(path, &backup_path).map_err(|e| Error::io(&backup_path, e))?;

    debug!("Created backup: {}", backup_path.display());
    Ok(backup_path)
}

/// Store for dry runs: nothing is written.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunStore;

impl ArtifactStore for DryRunStore {
    fn persist(&mut self, name: &str, content: &str) -> Result<u64> {
        info!("[dry run] Would write {} ({} bytes)", name, content.len());
        Ok(content.len() as u64)
    }
}

/// Keeps artifacts in memory, in the order they were persisted.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    artifacts: Vec<(String, String)>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored `(name, content)` pairs.
    #[must_use]
    pub fn artifacts(&self) -> &[(String, String)] {
        &self.artifacts
    }

    /// Content stored under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, content)| content.as_str())
    }

    /// Consumes the store, returning the stored pairs.
    #[must_use]
    pub fn into_artifacts(self) -> Vec<(String, String)> {
        self.artifacts
    }
}

impl ArtifactStore for MemoryStore {
    fn persist(&mut self, name: &str, content: &str) -> Result<u64> {
        self.artifacts.push((name.to_string(), content.to_string()));
        Ok(content.len() as u64)
    }
}

/// JSON document written next to the artifacts.
#[derive(Serialize)]
struct SummaryDocument<'a> {
    #[serde(flatten)]
    stats: &'a RunStatistics,
    total_tokens: usize,
    total_bytes: u64,
    total_source_files: usize,
}

/// Writes `{root_name}_summary.json` describing a finished run.
///
/// # Errors
///
/// Returns an error if the summary file cannot be written.
pub fn write_summary_json(output_dir: &Path, stats: &RunStatistics) -> Result<PathBuf> {
    let summary_path = output_dir.join(format!("{}_summary.json", stats.root_name));
    let file = fs::File::create(&summary_path).map_err(|e| Error::io(&summary_path, e))?;

    let document = SummaryDocument {
        stats,
        total_tokens: stats.total_tokens(),
        total_bytes: stats.total_bytes(),
        total_source_files: stats.total_source_files(),
    };
    serde_json::to_writer_pretty(file, &document)?;

    info!("Wrote summary to {}", summary_path.display());
    Ok(summary_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::OutputFileRecord;
    use assert_fs::prelude::*;

    #[test]
    fn test_fs_store_creates_output_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output_dir = temp.child("output/nested");

        FsStore::new(output_dir.path(), false).unwrap();

        assert!(output_dir.exists());
    }

    #[test]
    fn test_fs_store_writes_artifact() {
        let temp = assert_fs::TempDir::new().unwrap();
        let mut store = FsStore::new(temp.path(), false).unwrap();

        let size = store.persist("project_01.txt", "hello\n").unwrap();

        assert_eq!(size, 6);
        temp.child("project_01.txt").assert("hello\n");
        assert!(!temp.child("project_01.tmp").exists());
    }

    #[test]
    fn test_fs_store_overwrites_without_backup() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("project_01.txt").write_str("old content").unwrap();
        let mut store = FsStore::new(temp.path(), false).unwrap();

        store.persist("project_01.txt", "new\n").unwrap();

        temp.child("project_01.txt").assert("new\n");
        let backups = fs::read_dir(temp.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .contains(".backup.")
            })
            .count();
        assert_eq!(backups, 0);
    }

    #[test]
    fn test_fs_store_creates_backup() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("project_01.txt").write_str("old content").unwrap();
        let mut store = FsStore::new(temp.path(), true).unwrap();

        store.persist("project_01.txt", "new\n").unwrap();

        let backups: Vec<PathBuf> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains("project_01.txt.backup."))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "old content");
        temp.child("project_01.txt").assert("new\n");
    }

    #[test]
    fn test_fs_store_persist_failure() {
        let temp = assert_fs::TempDir::new().unwrap();
        let mut store = FsStore::new(temp.path(), false).unwrap();
        // A directory in the way of the target makes the rename fail.
        temp.child("project_01.txt/inner").create_dir_all().unwrap();

        let err = store.persist("project_01.txt", "x\n").unwrap_err();
        assert!(err.is_io());
        assert!(!temp.path().join("project_01.tmp").exists());
    }

    #[test]
    fn test_dry_run_store_writes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        let mut store = DryRunStore;

        let size = store.persist("project_01.txt", "héllo\n").unwrap();

        assert_eq!(size, 7);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_memory_store_keeps_order() {
        let mut store = MemoryStore::new();
        store.persist("a_01.txt", "one\n").unwrap();
        store.persist("a_02.txt", "two\n").unwrap();

        assert_eq!(store.get("a_02.txt"), Some("two\n"));
        assert_eq!(store.get("a_03.txt"), None);
        let names: Vec<&str> = store.artifacts().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a_01.txt", "a_02.txt"]);
    }

    #[test]
    fn test_write_summary_json() {
        let temp = assert_fs::TempDir::new().unwrap();
        let mut stats = RunStatistics::new("project", 100, true);
        stats.files_processed = 2;
        stats.records.push(OutputFileRecord {
            filename: "project_01.txt".to_string(),
            token_count: 42,
            byte_size: 128,
            source_file_count: 2,
        });

        let path = write_summary_json(temp.path(), &stats).unwrap();

        assert_eq!(path, temp.path().join("project_summary.json"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["root_name"], "project");
        assert_eq!(json["files_processed"], 2);
        assert_eq!(json["records"][0]["token_count"], 42);
        assert_eq!(json["total_tokens"], 42);
    }
}
