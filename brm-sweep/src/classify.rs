//! Maps a raw oracle verdict to a status and a move of `k`.
//!
//! | code | status               | move of k                                   |
//! |------|----------------------|---------------------------------------------|
//! | 0    | `valid`              | tighten, or hold once the floor was reached |
//! | >= 1 | `invalid_no_r2`      | loosen                                      |
//! | -1   | `invalid_zero_set`   | loosen, and the floor is now reached        |
//! | -2   | `invalid_full_set`   | tighten, or stop once the floor was reached |
//! | -3   | `invalid_collisions` | stop                                        |

use brm_oracle::Verdict;
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize)]
pub enum Status {
    #[strum(serialize = "valid")]
    #[serde(rename = "valid")]
    Valid,
    #[strum(serialize = "invalid_no_r2")]
    #[serde(rename = "invalid_no_r2")]
    InvalidNoR2,
    #[strum(serialize = "invalid_zero_set")]
    #[serde(rename = "invalid_zero_set")]
    InvalidZeroSet,
    #[strum(serialize = "invalid_full_set")]
    #[serde(rename = "invalid_full_set")]
    InvalidFullSet,
    #[strum(serialize = "invalid_collisions")]
    #[serde(rename = "invalid_collisions")]
    InvalidCollisions,
}

impl Status {
    pub fn of_code(raw_code: i64) -> Status {
        match raw_code {
            0 => Status::Valid,
            -1 => Status::InvalidZeroSet,
            -2 => Status::InvalidFullSet,
            -3 => Status::InvalidCollisions,
            // positive counts, and codes `Verdict::new` rejects, read as no match
            _ => Status::InvalidNoR2,
        }
    }
}

/// Direction in which the search moves `k` after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `k - 1`
    Tighten,
    /// `k + 1`
    Loosen,
    /// keep `k`; the visited skip moves past it
    Hold,
    /// no further evaluation for this `m`
    Stop,
}

impl Step {
    pub fn offset(&self) -> i64 {
        match self {
            Step::Tighten => -1,
            Step::Loosen => 1,
            Step::Hold | Step::Stop => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: Status,
    pub step: Step,
    pub candidate_count: u64,
    /// Whether this verdict means the floor has been reached (an empty candidate set).
    pub sets_floor: bool,
}

impl Classification {
    pub fn is_terminal(&self) -> bool {
        self.step == Step::Stop
    }
}

pub fn classify(verdict: &Verdict, floor_reached: bool) -> Classification {
    let status = Status::of_code(verdict.raw_code);
    let step = match status {
        Status::Valid if floor_reached => Step::Hold,
        Status::Valid => Step::Tighten,
        Status::InvalidNoR2 | Status::InvalidZeroSet => Step::Loosen,
        Status::InvalidFullSet if floor_reached => Step::Stop,
        Status::InvalidFullSet => Step::Tighten,
        Status::InvalidCollisions => Step::Stop,
    };
    Classification {
        status,
        step,
        candidate_count: verdict.candidate_count,
        sets_floor: status == Status::InvalidZeroSet,
    }
}

/// Operator-facing line for one evaluated point.
pub fn describe(m: usize, n: usize, k: usize, c: &Classification, state_space: u64) -> String {
    let head = format!("[m={},n={},k={}]", m, n, k);
    match c.status {
        Status::Valid => format!(
            "{} SUCCESS: Set of {}/{} is valid!",
            head, c.candidate_count, state_space
        ),
        Status::InvalidNoR2 => format!(
            "{} FAILED: Set of {}/{} contains no actual R2 state...",
            head, c.candidate_count, state_space
        ),
        Status::InvalidZeroSet => format!("{} FAILED: Zero candidates...", head),
        Status::InvalidFullSet => format!("{} FAILED: Too many candidates...", head),
        Status::InvalidCollisions => format!(
            "{} FAILED: Set of {}/{} contains collisions...",
            head, c.candidate_count, state_space
        ),
    }
}
