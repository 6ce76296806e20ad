//! Experiment harness around the clocked-LFSR state recovery oracle.
//!
//! Two execution models share the same classifier, naming policy and result log:
//!
//! - a queue-driven sequential search ([`controller::SearchController`]) that pops jobs from a
//!   durable text queue and, for each word length `m`, hill-climbs over the error tolerance `k`;
//! - an exhaustive sweep ([`executor::SweepExecutor`]) that evaluates every `(m, k)` point of a
//!   grid on a fixed-size worker pool and optionally validates the matched candidate sets.

pub mod classify;
pub mod cli;
pub mod config;
pub mod controller;
pub mod def;
pub mod executor;
pub mod job;
pub mod queue;
pub mod sink;
pub mod test_helper;
pub mod utils;
pub mod validator;

pub use classify::{classify, Classification, Status, Step};
pub use config::{Config, DataLayout, SweepConfig};
pub use controller::{JobReport, RunReport, SearchController, SearchState};
pub use executor::{SweepExecutor, SweepOutcome};
pub use job::{Job, JobError, Mode};
pub use queue::{JobQueue, QueueError};
pub use sink::{LogEntry, ResultSink};
