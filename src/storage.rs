//! Storage layer for slate
//!
//! All state lives in a `.slate/` directory at the ledger root:
//!
//! ```text
//! .slate/
//!   tasks.jsonl            # append-only task events
//!   tasks.snapshot.json    # derived snapshot of surviving tasks
//!   locks/                 # lock files (per-file and per-slug-base)
//! ```
//!
//! Writes go through the atomic temp-file + rename pattern so concurrent
//! readers never observe a partial file.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Name of the ledger data directory
pub const DATA_DIR: &str = ".slate";

/// Storage manager for slate state
#[derive(Debug, Clone)]
pub struct Storage {
    /// Path to the ledger root (the directory holding `.slate/`)
    root: PathBuf,
}

impl Storage {
    /// Create a storage manager rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    /// Path to the ledger root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the `.slate/` data directory
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    /// Path to the task event log (JSONL format)
    pub fn tasks_log(&self) -> PathBuf {
        self.data_dir().join("tasks.jsonl")
    }

    /// Path to the derived task snapshot
    pub fn tasks_snapshot(&self) -> PathBuf {
        self.data_dir().join("tasks.snapshot.json")
    }

    /// Path to the lock file directory
    pub fn locks_dir(&self) -> PathBuf {
        self.data_dir().join("locks")
    }

    /// Lock file guarding writes to `path`
    pub fn write_lock(&self, path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        self.locks_dir().join(format!("{name}.lock"))
    }

    /// Lock file serializing slug allocation for one base
    pub fn base_lock(&self, base: &str) -> PathBuf {
        self.locks_dir().join(format!("base-{base}.lock"))
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Create the `.slate/` directory structure
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.data_dir())?;
        fs::create_dir_all(self.locks_dir())?;

        // Touch the event log so an initialized ledger is recognizable.
        let log = self.tasks_log();
        if !log.exists() {
            File::create(&log)?;
        }

        Ok(())
    }

    /// Check whether this root holds an initialized ledger
    pub fn is_initialized(&self) -> bool {
        self.data_dir().exists()
    }

    // =========================================================================
    // File I/O helpers (atomic writes for safety)
    // =========================================================================

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        self.write_atomic(path, json.as_bytes())
    }

    /// Read JSON data from a file
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Write data atomically using temp file + rename
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Temp file in the same directory so the rename stays atomic; the
        // pid suffix keeps two processes from clobbering each other's temp.
        let temp_path = path.with_extension(format!("tmp.{}", std::process::id()));

        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;

        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Append a record to a JSONL file
    ///
    /// Not atomic on its own; callers hold the file's write lock.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        writeln!(file, "{}", json)?;
        file.sync_all()?;

        Ok(())
    }

    /// Read all records from a JSONL file
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: T = serde_json::from_str(&line)?;
            records.push(record);
        }

        Ok(records)
    }
}
