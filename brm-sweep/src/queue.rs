//! Durable FIFO of jobs backed by a plain text file.
//!
//! One comma-delimited job record per line, the first line being the next job. Popping a job
//! rewrites the file without its first record. The remainder is written to a temporary file in
//! the same directory and renamed over the queue, so a crash leaves either the old queue or the
//! new one on disk, never a truncated mix. The caller must not start working on a popped job
//! before `dequeue_next` returns.
//!
//! There is no cross-process locking: a queue has a single consumer.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use crate::job::{Job, JobError};

#[derive(thiserror::Error, Debug)]
pub enum QueueError {
    #[error("Queue: no more jobs")]
    EmptyQueue,

    #[error("Queue: cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Queue: malformed record {line:?}: {source}")]
    Malformed {
        line: String,
        #[source]
        source: JobError,
    },

    #[error("Queue: IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct JobQueue {
    path: PathBuf,
}

impl JobQueue {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_records(&self) -> Result<Vec<String>, QueueError> {
        let content = fs::read_to_string(&self.path).map_err(|source| QueueError::Unreadable {
            path: self.path.clone(),
            source,
        })?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn rewrite(&self, records: &[String]) -> Result<(), QueueError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        for r in records {
            writeln!(tmp, "{}", r)?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Removes and returns the first job. The remaining records are on disk, in their
    /// original order, when this returns `Ok`.
    ///
    /// # Errors
    /// - `EmptyQueue` when no record is left
    /// - `Unreadable` when the queue file cannot be read
    /// - `Malformed` when the first record does not parse; the queue is left untouched
    pub fn dequeue_next(&self) -> Result<Job, QueueError> {
        let records = self.read_records()?;
        let (head, rest) = records.split_first().ok_or(QueueError::EmptyQueue)?;
        let job = Job::parse_record(head).map_err(|source| QueueError::Malformed {
            line: head.clone(),
            source,
        })?;
        self.rewrite(rest)?;
        debug!("dequeued {:?}, {} jobs left", head, rest.len());
        Ok(job)
    }

    /// Appends a job at the tail, creating the queue file if needed.
    pub fn push(&self, job: &Job) -> Result<(), QueueError> {
        let needs_newline = match fs::read(&self.path) {
            Ok(bz) => !bz.is_empty() && !bz.ends_with(b"\n"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(source) => {
                return Err(QueueError::Unreadable {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if needs_newline {
            writeln!(f)?;
        }
        writeln!(f, "{}", job.to_record())?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.read_records()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }
}
