use std::sync::atomic::Ordering;

pub const SC: Ordering = Ordering::SeqCst;

pub const JOBS_FILE_NAME: &str = "jobs.txt";
pub const LOG_EXT: &str = "log";
pub const CANDIDATE_EXT: &str = "cand";

// Distance between two searched word lengths in queue-driven mode
pub const DEFAULT_M_STEP: usize = 20;

// Capacity of the sweep result channel; producers block once it is full
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

// Exhaustive sweeps go up to k < m / ERROR_RATIO by default
pub const DEFAULT_ERROR_RATIO: usize = 2;
pub const DEFAULT_ERROR_LOW: usize = 1;

pub const JOB_FIELD_COUNT: usize = 9;

// Largest accepted word length; the search memo holds one slot per k below m
pub const MAX_WORD_LENGTH: usize = 1 << 20;

pub const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}";
