use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::def::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_ERROR_LOW, DEFAULT_ERROR_RATIO, DEFAULT_M_STEP};

/// How the oracle binary reports its verdict.
#[derive(ValueEnum, Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// Last stdout line is `<code>,<count>`
    Report,
    /// Exit status 0 is a match
    ExitCode,
}

impl From<Protocol> for brm_oracle::ProcessProtocol {
    fn from(p: Protocol) -> Self {
        match p {
            Protocol::Report => brm_oracle::ProcessProtocol::Report,
            Protocol::ExitCode => brm_oracle::ProcessProtocol::ExitCode,
        }
    }
}

#[derive(Subcommand, Debug, Serialize, Clone)]
pub enum Command {
    /// Pop jobs from the queue and run the adaptive search on each
    Run,
    /// Evaluate every (m, k) point of a grid concurrently
    Sweep {
        #[arg(long, default_value_t = 16)]
        degree: u32,

        #[arg(long, default_value_t = 10)]
        min_m: usize,

        /// Exclusive
        #[arg(long, default_value_t = 60)]
        max_m: usize,

        #[arg(long, default_value_t = DEFAULT_ERROR_LOW)]
        error_low: usize,

        /// k runs up to m / error_ratio, exclusive
        #[arg(long, default_value_t = DEFAULT_ERROR_RATIO)]
        error_ratio: usize,

        #[arg(long, default_value_t = 20012)]
        r1: u64,

        #[arg(long, default_value_t = 32022)]
        r2: u64,

        #[arg(long, default_value_t = 0)]
        collision_accept: u32,

        /// Check each matched candidate file against r2 and delete the useless ones
        #[arg(long, default_value_t = false)]
        validate: bool,

        #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
        channel_capacity: usize,
    },
    /// Append a job record to the queue
    Enqueue {
        /// degree,m,n,kFactor,stopM,r1,r2,collisionAccept,mode
        record: String,
    },
    /// Check that a candidate file contains a given register state
    Validate {
        file: String,

        #[arg(long)]
        truth: u64,

        /// Delete the file when the state is missing
        #[arg(long, default_value_t = false)]
        discard: bool,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Run => "run",
            Command::Sweep { .. } => "sweep",
            Command::Enqueue { .. } => "enqueue",
            Command::Validate { .. } => "validate",
        }
    }
}

#[derive(Parser, Debug, Serialize, Clone)]
pub struct SweepCli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding jobs.txt, the result logs and the candidate files
    #[arg(long, default_value = "./data")]
    pub data_dir: String,

    /// Worker budget; 0 uses every available core
    #[arg(long, default_value_t = 0)]
    pub workers: usize,

    /// Oracle binary
    #[arg(long, default_value = "./main")]
    pub oracle_bin: String,

    #[arg(long, value_enum, default_value_t = Protocol::Report)]
    pub protocol: Protocol,

    /// Kill an oracle call after this many seconds; 0 waits forever
    #[arg(long, default_value_t = 0)]
    pub oracle_timeout_secs: u64,

    /// Working directory of the oracle and of the build command; empty keeps the current one
    #[arg(long, default_value = "")]
    pub oracle_dir: String,

    /// Command rebuilding the oracle before each job, e.g. "make"; the job mode is appended
    #[arg(long, default_value = "")]
    pub build_cmd: String,

    /// Output filename for the run summary
    #[arg(long, default_value = "")]
    pub output: String,

    #[arg(long, default_value_t = DEFAULT_M_STEP)]
    pub m_step: usize,

    /// Draw a progress bar during sweeps
    #[arg(long, default_value_t = false)]
    pub progress: bool,
}
