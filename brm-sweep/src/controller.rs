//! Queue-driven adaptive search over the error tolerance `k`.
//!
//! For each word length `m` of a job, the search starts at `k0 = floor(m / kFactor)` and
//! hill-climbs on the oracle's categorical feedback: too tight a tolerance yields empty candidate
//! sets, too loose a tolerance yields oversized or colliding ones. Every `k` in `[0, m - 1)` is
//! sent to the oracle at most once per `m`; landing on an already visited `k` costs nothing and
//! moves on to `k + 1`. Leaving `[0, m - 1)` ends the search for that `m`.
//!
//! The search is strictly sequential: one oracle call at a time, each answer deciding the next
//! call.

use std::time::Instant;

use anyhow::{Context, Result};
use brm_oracle::{BuildHook, Oracle, OracleParams, Verdict};
use log::{debug, info, warn};
use serde::Serialize;

use crate::classify::{classify, describe, Classification, Status};
use crate::config::Config;
use crate::job::Job;
use crate::queue::{JobQueue, QueueError};
use crate::sink::{LogEntry, ResultSink};

/// Per-`m` memo of the adaptive search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    m: usize,
    k: i64,
    visited: Vec<bool>,
    floor_reached: bool,
    finished: bool,
}

impl SearchState {
    pub fn new(m: usize, k_factor: f64) -> Self {
        Self {
            m,
            k: (m as f64 / k_factor).floor() as i64,
            visited: vec![false; m.saturating_sub(1)],
            floor_reached: false,
            finished: false,
        }
    }

    pub fn current_k(&self) -> i64 {
        self.k
    }

    pub fn floor_reached(&self) -> bool {
        self.floor_reached
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_visited(&self, k: usize) -> bool {
        self.visited.get(k).copied().unwrap_or(false)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.iter().filter(|v| **v).count()
    }

    /// The next `k` that needs an oracle call, skipping visited ones.
    /// `None` once the search for this `m` is over.
    pub fn next_k(&mut self) -> Option<usize> {
        while !self.finished {
            if self.k < 0 || self.k as usize >= self.visited.len() {
                debug!("m={} k={} left the search domain", self.m, self.k);
                self.finished = true;
                break;
            }
            let k = self.k as usize;
            if !self.visited[k] {
                return Some(k);
            }
            self.k += 1;
        }
        None
    }

    /// Folds the verdict for `k` into the state and returns the updated state.
    pub fn observe(mut self, k: usize, verdict: &Verdict) -> (Self, Classification) {
        let c = classify(verdict, self.floor_reached);
        self.visited[k] = true;
        if c.sets_floor {
            self.floor_reached = true;
        }
        if c.is_terminal() {
            self.finished = true;
        } else {
            self.k = k as i64 + c.step.offset();
        }
        (self, c)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobReport {
    pub record: String,
    pub skipped: bool,
    pub points: u64,
    /// `(m, k)` points that produced a valid set
    pub valid: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub jobs: Vec<JobReport>,
}

impl RunReport {
    pub fn points(&self) -> u64 {
        self.jobs.iter().map(|j| j.points).sum()
    }

    pub fn valid(&self) -> usize {
        self.jobs.iter().map(|j| j.valid.len()).sum()
    }
}

pub struct SearchController<O: Oracle> {
    oracle: O,
    config: Config,
    build_hook: Option<BuildHook>,
}

impl<O: Oracle> SearchController<O> {
    pub fn new(oracle: O, config: Config) -> Self {
        Self {
            oracle,
            config,
            build_hook: None,
        }
    }

    pub fn with_build_hook(mut self, hook: Option<BuildHook>) -> Self {
        self.build_hook = hook;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn query(&self, params: &OracleParams) -> Verdict {
        metrics::counter!("brm.oracle.calls").increment(1);
        self.oracle.query(params).unwrap_or_else(|e| {
            warn!("[m={},k={}] oracle failed, counting as no match: {}", params.m, params.k, e);
            metrics::counter!("brm.oracle.failures").increment(1);
            Verdict::no_match()
        })
    }

    /// Runs the adaptive search for one `m` of `job`, appending one log entry per oracle call.
    pub fn search_m(&self, job: &Job, m: usize, sink: &mut ResultSink) -> Result<Vec<LogEntry>> {
        let n = m.saturating_mul(2);
        let mut state = SearchState::new(m, job.k_factor);
        let mut entries = vec![];
        while let Some(k) = state.next_k() {
            let params = OracleParams::new(job.degree, m, k, job.r1, job.r2)
                .with_collision_accept(job.collision_accept)
                .with_worker_budget(self.config.worker_budget);
            let start = Instant::now();
            let verdict = self.query(&params);
            let elapsed = start.elapsed();
            metrics::histogram!("brm.oracle.duration_ms").record(elapsed.as_secs_f64() * 1e3);

            let (next, c) = state.observe(k, &verdict);
            state = next;
            let entry = LogEntry {
                m,
                n,
                k,
                candidate_count: c.candidate_count,
                status: c.status,
                elapsed,
                workers: self.config.worker_budget,
            };
            sink.append(&entry)?;
            metrics::counter!("brm.search.points").increment(1);
            info!("{}", describe(m, n, k, &c, params.state_space()));
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Runs every `m` of a job, from `job.m` up to `job.stop_m` in steps of `m_step`.
    pub fn run_job(&self, job: &Job) -> Result<JobReport> {
        let mut report = JobReport {
            record: job.to_record(),
            ..Default::default()
        };
        if !job.text_long_enough() {
            warn!(
                "[m={},n={}] Search text too short, skipping job {}",
                job.m, job.n, report.record
            );
            report.skipped = true;
            return Ok(report);
        }
        if let Some(hook) = &self.build_hook {
            hook.prepare(job.mode.build_target())
                .with_context(|| format!("cannot prepare oracle for job {}", report.record))?;
        }

        let log_path = self.config.layout().log_path(
            job.mode.as_ref(),
            job.degree,
            job.r1,
            job.r2,
            job.m,
            job.m.saturating_mul(2),
            job.collision_accept,
        );
        let mut sink = ResultSink::open(&log_path)?;
        info!("Running job {} into {}", report.record, log_path.display());

        let step = self.config.m_step.max(1);
        let mut m = job.m;
        while m < job.stop_m {
            for e in self.search_m(job, m, &mut sink)? {
                report.points += 1;
                if e.status == Status::Valid {
                    report.valid.push((e.m, e.k));
                }
            }
            m = m.saturating_add(step);
        }
        info!(
            "Job {} done, {} entries in {}",
            report.record,
            sink.written(),
            sink.path().display()
        );
        Ok(report)
    }

    /// Pops and runs jobs until the queue is empty.
    pub fn run_queue(&self, queue: &JobQueue) -> Result<RunReport> {
        let mut run = RunReport::default();
        loop {
            let job = match queue.dequeue_next() {
                Ok(job) => job,
                Err(QueueError::EmptyQueue) => {
                    info!("No more jobs, shutting down...");
                    break;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("cannot take a job from {}", queue.path().display())
                    })
                }
            };
            run.jobs.push(self.run_job(&job)?);
        }
        info!(
            "Done: {} jobs, {} valid sets out of {} points",
            run.jobs.len(),
            run.valid(),
            run.points()
        );
        Ok(run)
    }
}
