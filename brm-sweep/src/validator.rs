//! Checks persisted candidate sets against the known register state.
//!
//! A candidate file is written by the oracle, one record per line: the candidate initial state,
//! a comma, the undecimated output, and sometimes a `[!]` marker. Blank lines may appear. Only
//! the first field matters here. A set without the true state is useless, so the caller deletes
//! it; the log entry of that point stays.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::info;

#[derive(thiserror::Error, Debug)]
pub enum ValidateError {
    #[error("Validate: cannot open candidate file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Validate: IO error: {0}")]
    Io(#[from] io::Error),
}

/// Returns true as soon as a record's first field equals `truth`.
pub fn validate(path: impl AsRef<Path>, truth: u64) -> Result<bool, ValidateError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ValidateError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        let first = line.split(',').next().unwrap_or("").trim();
        if first.parse::<u64>().ok() == Some(truth) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Validates and deletes the file when it lacks the true state.
pub fn validate_or_discard(path: impl AsRef<Path>, truth: u64) -> Result<bool, ValidateError> {
    let path = path.as_ref();
    let found = validate(path, truth)?;
    if !found {
        info!(
            "Candidate set {} lacks state {}, removing it",
            path.display(),
            truth
        );
        fs::remove_file(path)?;
        metrics::counter!("brm.candidates.discarded").increment(1);
    }
    Ok(found)
}
