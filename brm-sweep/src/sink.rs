use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::classify::Status;

/// One evaluated `(m, k)` point, as recorded in the result log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub candidate_count: u64,
    pub status: Status,
    pub elapsed: Duration,
    pub workers: usize,
}

// m,n,k,candidateCount,status,elapsedNanoseconds,workerCount
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{}",
            self.m,
            self.n,
            self.k,
            self.candidate_count,
            self.status,
            self.elapsed.as_nanos(),
            self.workers
        )
    }
}

impl FromStr for LogEntry {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let f: Vec<&str> = line.trim().split(',').collect();
        if f.len() != 7 {
            return Err(anyhow!("log line {:?} has {} fields", line, f.len()));
        }
        let nanos: u64 = f[5].parse().context("elapsed")?;
        Ok(LogEntry {
            m: f[0].parse().context("m")?,
            n: f[1].parse().context("n")?,
            k: f[2].parse().context("k")?,
            candidate_count: f[3].parse().context("candidate count")?,
            status: f[4]
                .parse()
                .map_err(|_| anyhow!("unknown status {:?}", f[4]))?,
            elapsed: Duration::from_nanos(nanos),
            workers: f[6].parse().context("workers")?,
        })
    }
}

/// Append-only result log. One writer per file; a failed append is fatal for the run.
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
    file: File,
    written: u64,
}

impl ResultSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("cannot open log {}", path.display()))?;
        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn append(&mut self, entry: &LogEntry) -> Result<()> {
        self.file
            .write_all(format!("{}\n", entry).as_bytes())
            .with_context(|| format!("cannot append to {}", self.path.display()))?;
        self.file.flush()?;
        self.written += 1;
        Ok(())
    }
}

/// Reads every entry of a result log back.
pub fn read_log(path: impl AsRef<Path>) -> Result<Vec<LogEntry>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut entries = vec![];
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(line.parse()?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(k: usize, status: Status) -> LogEntry {
        LogEntry {
            m: 32,
            n: 64,
            k,
            candidate_count: 150,
            status,
            elapsed: Duration::from_nanos(1_234_567),
            workers: 8,
        }
    }

    #[test]
    fn test_log_line_format() {
        let e = entry(6, Status::Valid);
        assert_eq!(e.to_string(), "32,64,6,150,valid,1234567,8");
        assert_eq!(e.to_string().parse::<LogEntry>().unwrap(), e);
        assert!("32,64,6,150,bogus,1,8".parse::<LogEntry>().is_err());
        assert!("32,64,6".parse::<LogEntry>().is_err());
    }

    #[test]
    fn test_sink_appends_across_reopen() {
        let temp_dir = tempfile::Builder::new()
            .prefix("sink_test")
            .tempdir()
            .unwrap();
        let path = temp_dir.path().join("logs").join("and_11_100_100_32_64_0.log");
        {
            let mut sink = ResultSink::open(&path).unwrap();
            sink.append(&entry(6, Status::Valid)).unwrap();
            sink.append(&entry(5, Status::InvalidZeroSet)).unwrap();
            assert_eq!(sink.written(), 2);
        }
        let mut sink = ResultSink::open(&path).unwrap();
        sink.append(&entry(7, Status::InvalidNoR2)).unwrap();

        let entries = read_log(&path).unwrap();
        assert_eq!(
            entries.iter().map(|e| e.k).collect::<Vec<_>>(),
            vec![6, 5, 7]
        );
        assert_eq!(entries[1].status, Status::InvalidZeroSet);
    }
}
