//! JSONL journal writer and reader

use crate::error::StorageError;
use crate::record::JournalRecord;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Destination for validated records, in call order
pub trait RecordSink: Send {
    /// Append a record after everything appended before it
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    fn write_record(&mut self, record: &JournalRecord) -> Result<(), StorageError>;

    /// Push buffered records to durable storage
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be synced.
    fn flush(&mut self) -> Result<(), StorageError>;
}

/// In-memory sink, keeps every record in order
impl RecordSink for Vec<JournalRecord> {
    fn write_record(&mut self, record: &JournalRecord) -> Result<(), StorageError> {
        self.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write_record(&mut self, record: &JournalRecord) -> Result<(), StorageError> {
        (**self).write_record(record)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        (**self).flush()
    }
}

/// File-backed journal, one JSON record per line
///
/// Opened in append mode: an existing file is continued, never truncated.
/// Every record is handed to the OS as soon as it is appended; snapshots
/// and `flush` additionally sync file data to disk.
pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
    snapshots: u64,
    diffs: u64,
}

impl Journal {
    /// Open (or create) the journal at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or file cannot be created.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Writing journal to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            snapshots: 0,
            diffs: 0,
        })
    }

    /// Path of the journal file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written through this handle as (snapshots, diffs)
    #[must_use]
    pub const fn counts(&self) -> (u64, u64) {
        (self.snapshots, self.diffs)
    }

    /// Flush and sync, then close the file
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(mut self) -> Result<(), StorageError> {
        self.sync()?;
        info!(
            "Closed journal {} ({} snapshots, {} diffs)",
            self.path.display(),
            self.snapshots,
            self.diffs
        );
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

impl RecordSink for Journal {
    fn write_record(&mut self, record: &JournalRecord) -> Result<(), StorageError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;

        match record {
            JournalRecord::Snapshot { .. } => {
                self.snapshots += 1;
                self.sync()?;
                debug!("Persisted snapshot #{} to {}", self.snapshots, self.path.display());
            }
            JournalRecord::Diff { .. } => {
                self.diffs += 1;
                self.writer.flush()?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.sync()
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush journal {} on drop: {}", self.path.display(), e);
        }
    }
}

/// Sequential reader over a journal
///
/// Yields records in file order with their 1-based line number; blank lines
/// are skipped. A line that does not decode is reported as
/// [`StorageError::Corrupt`].
pub struct JournalReader<R: BufRead> {
    lines: Lines<R>,
    line: usize,
}

impl JournalReader<BufReader<File>> {
    /// Open a journal file for reading
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JournalReader<R> {
    /// Read records from any buffered source
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    /// Lines consumed so far, blank lines included
    #[must_use]
    pub const fn lines_read(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for JournalReader<R> {
    type Item = Result<(usize, JournalRecord), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;

            if text.trim().is_empty() {
                continue;
            }

            let line = self.line;
            return Some(
                serde_json::from_str::<JournalRecord>(&text)
                    .map(|record| (line, record))
                    .map_err(|e| StorageError::Corrupt {
                        line,
                        reason: e.to_string(),
                    }),
            );
        }
    }
}
