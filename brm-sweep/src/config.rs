//! Run-wide configuration and the file naming policy.
//!
//! Three pieces live here:
//! - [`Config`]: settings shared by every mode of a run (data directory, worker budget, oracle
//!   timeout, result channel capacity).
//! - [`SweepConfig`]: the `(m, k)` grid of one exhaustive sweep.
//! - [`DataLayout`]: how job, log and candidate file names are derived from a configuration
//!   tuple. Runs with identical parameters derive identical names, so repeated runs append to
//!   the same log.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::def::{
    CANDIDATE_EXT, DEFAULT_CHANNEL_CAPACITY, DEFAULT_ERROR_LOW, DEFAULT_ERROR_RATIO,
    DEFAULT_M_STEP, JOBS_FILE_NAME, LOG_EXT,
};

/// Settings shared by the sequential search and the exhaustive sweep.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the job queue, the logs and the oracle's candidate files
    pub data_dir: String,
    /// Threads handed to the oracle, and the pool size of the sweep executor
    pub worker_budget: usize,
    /// Increment of `m` between two inner searches of a job
    pub m_step: usize,
    /// Upper bound on a single oracle call; `None` waits forever
    pub oracle_timeout: Option<Duration>,
    /// Capacity of the sweep result channel
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            worker_budget: available_workers(),
            m_step: DEFAULT_M_STEP,
            oracle_timeout: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    pub fn from_dir(dir: &str) -> Self {
        Config {
            data_dir: dir.to_string(),
            ..Config::default()
        }
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir)
    }
}

pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Grid of one exhaustive sweep: `m` in `[min_m, max_m)`, and for every `m`,
/// `k` in `[error_low, m / error_ratio)`.
#[derive(Debug, Clone, Serialize)]
pub struct SweepConfig {
    pub degree: u32,
    pub min_m: usize,
    pub max_m: usize,
    pub error_low: usize,
    pub error_ratio: usize,
    pub r1: u64,
    pub r2: u64,
    pub collision_accept: u32,
    /// Check each matched point's candidate file against `r2` and delete useless ones
    pub validate: bool,
}

impl SweepConfig {
    pub fn new(degree: u32, min_m: usize, max_m: usize, r1: u64, r2: u64) -> Self {
        Self {
            degree,
            min_m,
            max_m,
            error_low: DEFAULT_ERROR_LOW,
            error_ratio: DEFAULT_ERROR_RATIO,
            r1,
            r2,
            collision_accept: 0,
            validate: false,
        }
    }

    pub fn m_range(&self) -> Range<usize> {
        self.min_m..self.max_m
    }

    pub fn k_range(&self, m: usize) -> Range<usize> {
        self.error_low..(m / self.error_ratio.max(1))
    }

    /// Every `(m, k)` pair of the grid, `m` ascending then `k` ascending.
    pub fn points(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.m_range()
            .flat_map(move |m| self.k_range(m).map(move |k| (m, k)))
    }

    pub fn total_points(&self) -> u64 {
        self.m_range().map(|m| self.k_range(m).len() as u64).sum()
    }
}

/// File naming policy rooted at the data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    dir: PathBuf,
}

impl DataLayout {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.dir.join(JOBS_FILE_NAME)
    }

    /// `<dir>/<tag>_<deg>_<r1>_<r2>_<m>_<n>_<col>.log`, where `tag` is a mode name or a ratio.
    pub fn log_path(
        &self,
        tag: &str,
        degree: u32,
        r1: u64,
        r2: u64,
        m: usize,
        n: usize,
        collision_accept: u32,
    ) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_{}_{}_{}_{}_{}.{}",
            tag, degree, r1, r2, m, n, collision_accept, LOG_EXT
        ))
    }

    pub fn sweep_log_path(&self, cfg: &SweepConfig) -> PathBuf {
        self.log_path(
            &format!("ratio{}", cfg.error_ratio),
            cfg.degree,
            cfg.r1,
            cfg.r2,
            cfg.min_m,
            cfg.min_m.saturating_mul(2),
            cfg.collision_accept,
        )
    }

    /// `<dir>/<deg>_<m>_<n>_<k>_<r1>_<r2>.cand`, as written by the oracle.
    pub fn candidate_path(
        &self,
        degree: u32,
        m: usize,
        n: usize,
        k: usize,
        r1: u64,
        r2: u64,
    ) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_{}_{}_{}_{}.{}",
            degree, m, n, k, r1, r2, CANDIDATE_EXT
        ))
    }
}
