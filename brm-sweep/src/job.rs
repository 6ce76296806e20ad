use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use crate::def::{JOB_FIELD_COUNT, MAX_WORD_LENGTH};

/// Combining function the oracle binary was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    And,
    Or2,
    Or3,
    Default,
}

impl Mode {
    /// Build target selecting this mode; the default build takes no target.
    pub fn build_target(&self) -> Option<&'static str> {
        match self {
            Mode::And => Some("and"),
            Mode::Or2 => Some("or2"),
            Mode::Or3 => Some("or3"),
            Mode::Default => None,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum JobError {
    #[error("Job: expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("Job: invalid {field} {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// One sweep parameter set read from the job queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub degree: u32,
    pub m: usize,
    pub n: usize,
    pub k_factor: f64,
    pub stop_m: usize,
    pub r1: u64,
    pub r2: u64,
    pub collision_accept: u32,
    pub mode: Mode,
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, JobError> {
    value.parse::<T>().map_err(|_| JobError::InvalidField {
        field,
        value: value.to_string(),
    })
}

impl Job {
    /// Parses one comma-delimited queue record:
    /// `degree, m, n, kFactor, stopM, r1, r2, collisionAccept, mode`.
    pub fn parse_record(line: &str) -> Result<Self, JobError> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != JOB_FIELD_COUNT {
            return Err(JobError::FieldCount {
                expected: JOB_FIELD_COUNT,
                found: fields.len(),
            });
        }
        let job = Job {
            degree: parse_field("degree", fields[0])?,
            m: parse_field("m", fields[1])?,
            n: parse_field("n", fields[2])?,
            k_factor: parse_field("kFactor", fields[3])?,
            stop_m: parse_field("stopM", fields[4])?,
            r1: parse_field("r1", fields[5])?,
            r2: parse_field("r2", fields[6])?,
            collision_accept: parse_field("collisionAccept", fields[7])?,
            mode: parse_field("mode", fields[8])?,
        };
        if !(job.k_factor.is_finite() && job.k_factor > 0.0) {
            return Err(JobError::InvalidField {
                field: "kFactor",
                value: fields[3].to_string(),
            });
        }
        for (field, value, raw) in [("m", job.m, fields[1]), ("stopM", job.stop_m, fields[4])] {
            if value > MAX_WORD_LENGTH || value.checked_mul(2).is_none() {
                return Err(JobError::InvalidField {
                    field,
                    value: raw.to_string(),
                });
            }
        }
        Ok(job)
    }

    pub fn to_record(&self) -> String {
        self.to_string()
    }

    /// The oracle needs a search text of at least twice the word length.
    pub fn text_long_enough(&self) -> bool {
        self.m.checked_mul(2).is_some_and(|t| self.n >= t)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{}",
            self.degree,
            self.m,
            self.n,
            self.k_factor,
            self.stop_m,
            self.r1,
            self.r2,
            self.collision_accept,
            self.mode
        )
    }
}

impl FromStr for Job {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Job::parse_record(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let job = Job::parse_record("11, 32, 64, 5.0, 40, 100, 100, 0, and").unwrap();
        assert_eq!(job.degree, 11);
        assert_eq!(job.m, 32);
        assert_eq!(job.n, 64);
        assert_eq!(job.k_factor, 5.0);
        assert_eq!(job.stop_m, 40);
        assert_eq!((job.r1, job.r2), (100, 100));
        assert_eq!(job.collision_accept, 0);
        assert_eq!(job.mode, Mode::And);
        assert!(job.text_long_enough());

        let again: Job = job.to_record().parse().unwrap();
        assert_eq!(again, job);
    }

    #[test]
    fn test_parse_record_errors() {
        assert_eq!(
            Job::parse_record("11,32,64"),
            Err(JobError::FieldCount {
                expected: 9,
                found: 3
            })
        );
        assert!(matches!(
            Job::parse_record("11,32,64,5.0,40,100,100,0,xor"),
            Err(JobError::InvalidField { field: "mode", .. })
        ));
        assert!(matches!(
            Job::parse_record("11,thirty,64,5.0,40,100,100,0,and"),
            Err(JobError::InvalidField { field: "m", .. })
        ));
        assert!(matches!(
            Job::parse_record("11,32,64,0,40,100,100,0,and"),
            Err(JobError::InvalidField {
                field: "kFactor",
                ..
            })
        ));
    }

    #[test]
    fn test_word_length_limit() {
        let huge = usize::MAX.to_string();
        let record = format!("11,{},{},5.0,40,100,100,0,and", huge, huge);
        assert!(matches!(
            Job::parse_record(&record),
            Err(JobError::InvalidField { field: "m", .. })
        ));
        let record = format!("11,32,64,5.0,{},100,100,0,and", MAX_WORD_LENGTH + 1);
        assert!(matches!(
            Job::parse_record(&record),
            Err(JobError::InvalidField { field: "stopM", .. })
        ));
        let record = format!("11,{},{},5.0,0,100,100,0,and", MAX_WORD_LENGTH, 2 * MAX_WORD_LENGTH);
        assert!(Job::parse_record(&record).unwrap().text_long_enough());

        // built by hand, past the parser
        let mut job = Job::parse_record("11,32,64,5.0,40,100,100,0,and").unwrap();
        job.m = usize::MAX;
        assert!(!job.text_long_enough());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(Mode::Or2.to_string(), "or2");
        assert_eq!(Mode::Default.as_ref(), "default");
        assert_eq!("or3".parse::<Mode>().unwrap(), Mode::Or3);
        assert_eq!(Mode::Default.build_target(), None);
        assert_eq!(Mode::And.build_target(), Some("and"));
    }
}
