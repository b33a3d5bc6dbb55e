//! On-disk store of extracted document text
//!
//! Each document is kept as `<guid>.txt` under the documents directory,
//! one paragraph per line.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::utils::error::StoreError;
use crate::utils::sanitize_filename;

/// Distinguishes temp files of concurrent writers in one process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Directory of extracted documents keyed by GUID
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Create a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the text file for `guid`
    pub fn path_for(&self, guid: &str) -> PathBuf {
        self.root.join(format!("{}.txt", sanitize_filename(guid)))
    }

    /// Whether text for `guid` has already been stored
    pub fn contains(&self, guid: &str) -> bool {
        self.path_for(guid).is_file()
    }

    /// Write the paragraphs of `guid`, replacing any previous version
    ///
    /// The text goes to a temp file in the same directory and is renamed into
    /// place, so readers see either no document or a complete one.
    pub fn save(&self, guid: &str, lines: &[String]) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| StoreError::CreateDir {
            path: self.root.clone(),
            source,
        })?;

        let path = self.path_for(guid);
        let temp_path = self.root.join(format!(
            ".{}.{}.{}.tmp",
            sanitize_filename(guid),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let content: String = lines.iter().map(|line| format!("{line}\n")).collect();
        fs::write(&temp_path, content).map_err(|source| StoreError::Write {
            path: temp_path.clone(),
            source,
        })?;

        if let Err(source) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::Write { path, source });
        }

        tracing::debug!(path = %path.display(), "Document stored");
        Ok(path)
    }

    /// Read all stored paragraphs of `guid`
    pub fn load_lines(&self, guid: &str) -> Result<Vec<String>, StoreError> {
        let path = self.path_for(guid);
        let content = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;

        Ok(content.lines().map(str::to_string).collect())
    }

    /// First stored paragraph of `guid`, used as a short description
    pub fn first_line(&self, guid: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(guid);
        let file = fs::File::open(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;

        BufReader::new(file)
            .lines()
            .next()
            .transpose()
            .map_err(|source| StoreError::Read { path, source })
    }
}
