//! Exhaustive concurrent sweep over the whole `(m, k)` grid.
//!
//! Every grid point becomes one job on a fixed-size thread pool. A job calls the oracle once and
//! sends a log entry over a bounded channel only when the verdict is a match; every job bumps the
//! progress counter, match or not. The calling thread drains the channel while the pool works, so
//! a full channel only ever blocks workers until the drain catches up. Matches are sorted by
//! `(m, k)` before they reach the log, which gives a stable log order across runs.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use brm_oracle::{Oracle, OracleParams, Verdict};
use crossbeam::channel::{bounded, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::Serialize;
use threadpool::ThreadPool;

use crate::classify::Status;
use crate::config::{Config, SweepConfig};
use crate::def::{PROGRESS_TEMPLATE, SC};
use crate::sink::{LogEntry, ResultSink};
use crate::validator::validate_or_discard;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepOutcome {
    /// Points whose oracle call completed
    pub attempted: u64,
    /// Points in the grid
    pub total: u64,
    pub matches: Vec<LogEntry>,
    /// Matches whose candidate set contains the true state
    pub validated: usize,
    /// Matches whose candidate file was deleted
    pub discarded: usize,
}

pub struct SweepExecutor {
    oracle: Arc<dyn Oracle>,
    config: Config,
    oracle_budget: usize,
    progress: Arc<AtomicU64>,
    show_progress: bool,
}

impl SweepExecutor {
    pub fn new(oracle: Arc<dyn Oracle>, config: Config) -> Self {
        Self {
            oracle,
            config,
            oracle_budget: 1,
            progress: Arc::new(AtomicU64::new(0)),
            show_progress: false,
        }
    }

    /// Threads each oracle call may use on its own.
    pub fn with_oracle_budget(mut self, budget: usize) -> Self {
        self.oracle_budget = budget.max(1);
        self
    }

    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Points completed so far, across every `evaluate` on this executor.
    pub fn progress(&self) -> u64 {
        self.progress.load(SC)
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        match ProgressStyle::with_template(PROGRESS_TEMPLATE) {
            Ok(style) => pb.set_style(style.progress_chars("##-")),
            Err(e) => warn!("bad progress template: {}", e),
        }
        pb
    }

    /// Runs the oracle on every grid point and returns the matches, sorted by `(m, k)`.
    pub fn evaluate(&self, sweep: &SweepConfig) -> Vec<LogEntry> {
        let workers = self.config.worker_budget.max(1);
        let pool = ThreadPool::new(workers);
        let (sender, receiver) = bounded::<LogEntry>(self.config.channel_capacity.max(1));
        let pb = self.progress_bar(sweep.total_points());

        for (m, k) in sweep.points() {
            let params = OracleParams::new(sweep.degree, m, k, sweep.r1, sweep.r2)
                .with_collision_accept(sweep.collision_accept)
                .with_worker_budget(self.oracle_budget);
            let oracle = self.oracle.clone();
            let sender: Sender<LogEntry> = sender.clone();
            let progress = self.progress.clone();
            let pb = pb.clone();
            pool.execute(move || {
                metrics::counter!("brm.oracle.calls").increment(1);
                let start = Instant::now();
                let verdict = oracle.query(&params).unwrap_or_else(|e| {
                    warn!("[m={},k={}] oracle failed, counting as no match: {}", m, k, e);
                    metrics::counter!("brm.oracle.failures").increment(1);
                    Verdict::no_match()
                });
                if verdict.is_match() {
                    let entry = LogEntry {
                        m,
                        n: params.n,
                        k,
                        candidate_count: verdict.candidate_count,
                        status: Status::Valid,
                        elapsed: start.elapsed(),
                        workers,
                    };
                    if sender.send(entry).is_err() {
                        warn!("[m={},k={}] result channel closed, match lost", m, k);
                    }
                }
                progress.fetch_add(1, SC);
                pb.inc(1);
            });
        }
        drop(sender);

        // ends once every job has dropped its sender
        let mut matches: Vec<LogEntry> = receiver.iter().collect();
        pool.join();
        pb.finish_and_clear();
        matches.sort_by_key(|e| (e.m, e.k));
        matches
    }

    /// Sweeps the grid, validates matches when asked, and appends them to the sweep log.
    pub fn run(&self, sweep: &SweepConfig) -> Result<SweepOutcome> {
        let total = sweep.total_points();
        info!(
            "Testing R1 = {}, R2 = {}, m = {} .. {}, k = {} .. m/{} which gives a total of {} runs.",
            sweep.r1,
            sweep.r2,
            sweep.min_m,
            sweep.max_m,
            sweep.error_low,
            sweep.error_ratio,
            total
        );
        let before = self.progress();
        let matches = self.evaluate(sweep);
        let mut outcome = SweepOutcome {
            attempted: self.progress() - before,
            total,
            ..Default::default()
        };
        metrics::counter!("brm.sweep.matches").increment(matches.len() as u64);

        let layout = self.config.layout();
        if sweep.validate {
            for e in &matches {
                let path = layout.candidate_path(sweep.degree, e.m, e.n, e.k, sweep.r1, sweep.r2);
                let found = validate_or_discard(&path, sweep.r2)
                    .with_context(|| format!("cannot validate {}", path.display()))?;
                if found {
                    outcome.validated += 1;
                } else {
                    outcome.discarded += 1;
                }
            }
        }

        let log_path = layout.sweep_log_path(sweep);
        let mut sink = ResultSink::open(&log_path)?;
        for e in &matches {
            sink.append(e)
                .with_context(|| format!("sweep log {}", log_path.display()))?;
        }
        info!("{} of {} potentially valid sets found.", matches.len(), total);
        outcome.matches = matches;
        Ok(outcome)
    }
}
