//! # Telemetry Logger
//!
//! Appends one JSON record per line to `telemetry_*.jsonl` files.
//!
//! A new file is started after a fixed number of records, and only the
//! newest files are kept.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::stats::LinkStats;
use crate::error::Result;
use crate::protocol::frame::{NormalizedAngle, NUM_JOINTS};

/// Prefix shared by every telemetry log file
const FILE_PREFIX: &str = "telemetry_";

/// Extension of telemetry log files
const FILE_EXTENSION: &str = "jsonl";

/// One line of the telemetry log.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub link_state: String,
    pub last_sequence: Option<u8>,
    /// Latest target per joint, `null` until the first frame
    pub targets: [Option<NormalizedAngle>; NUM_JOINTS],
    pub stale: bool,
    pub stats: LinkStats,
}

/// Writes [`TelemetryRecord`]s as JSON Lines.
///
/// A new file is started after `max_records_per_file` records, and only the
/// newest `max_files_to_keep` files are retained.
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    file_index: u64,
}

impl std::fmt::Debug for TelemetryLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryLogger")
            .field("dir", &self.dir)
            .field("current_path", &self.current_path)
            .field("records_in_file", &self.records_in_file)
            .finish_non_exhaustive()
    }
}

impl TelemetryLogger {
    /// Create a logger writing into `dir` (created if missing)
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            current_path: None,
            records_in_file: 0,
            file_index: 0,
        })
    }

    /// Path of the file currently being written
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Append one record, rotating files as needed
    pub fn write(&mut self, record: &TelemetryRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(record)?;
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", line)?;
            self.records_in_file += 1;
        }

        Ok(())
    }

    /// Flush buffered records to disk
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        let name = format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.file_index,
            FILE_EXTENSION
        );
        let path = self.dir.join(name);
        let file = File::create(&path)?;

        info!("Telemetry log: {}", path.display());
        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;
        self.file_index += 1;

        self.prune()
    }

    fn prune(&self) -> Result<()> {
        let mut files = log_files(&self.dir)?;
        files.sort();

        if files.len() > self.max_files_to_keep {
            let excess = files.len() - self.max_files_to_keep;
            for old in files.into_iter().take(excess) {
                debug!("Removing old telemetry log {}", old.display());
                fs::remove_file(old)?;
            }
        }

        Ok(())
    }
}

/// Telemetry log files in `dir`, unsorted
fn log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_EXTENSION));
        if is_log {
            files.push(path);
        }
    }

    Ok(files)
}
