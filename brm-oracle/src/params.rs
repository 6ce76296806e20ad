use serde::Serialize;

use crate::error::OracleError;

/// Lowest verdict code the oracle is allowed to return (`-3`, collisions).
pub const MIN_VERDICT_CODE: i64 = -3;

/// Inputs of one oracle invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OracleParams {
    /// Degree of the feedback polynomial (11 and 16 are the supported ones).
    pub degree: u32,
    /// Search word length.
    pub m: usize,
    /// Keystream (search text) length; the oracle expects `2m`.
    pub n: usize,
    /// Error tolerance.
    pub k: usize,
    /// Initial state of the clocking register R1.
    pub r1: u64,
    /// Initial state of the clocked register R2.
    pub r2: u64,
    pub collision_accept: u32,
    pub plaintext: Option<u64>,
    pub target_cipher: Option<u64>,
    /// Thread budget handed to the oracle for its own internal pool.
    pub worker_budget: usize,
}

impl OracleParams {
    pub fn new(degree: u32, m: usize, k: usize, r1: u64, r2: u64) -> Self {
        Self {
            degree,
            m,
            n: m.saturating_mul(2),
            k,
            r1,
            r2,
            collision_accept: 0,
            plaintext: None,
            target_cipher: None,
            worker_budget: 1,
        }
    }

    pub fn with_collision_accept(mut self, collision_accept: u32) -> Self {
        self.collision_accept = collision_accept;
        self
    }

    pub fn with_worker_budget(mut self, worker_budget: usize) -> Self {
        self.worker_budget = worker_budget;
        self
    }

    pub fn with_known_plaintext(mut self, plaintext: u64, target_cipher: u64) -> Self {
        self.plaintext = Some(plaintext);
        self.target_cipher = Some(target_cipher);
        self
    }

    /// Size of the register state space, `2^degree`.
    pub fn state_space(&self) -> u64 {
        1u64 << self.degree
    }
}

/// Raw answer of the oracle. Never persisted as-is; the classifier turns it into a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub raw_code: i64,
    pub candidate_count: u64,
}

impl Verdict {
    pub fn new(raw_code: i64, candidate_count: u64) -> Result<Self, OracleError> {
        if raw_code < MIN_VERDICT_CODE {
            return Err(OracleError::UnknownVerdict(raw_code));
        }
        Ok(Self {
            raw_code,
            candidate_count,
        })
    }

    /// The verdict used in place of an oracle that could not answer.
    pub fn no_match() -> Self {
        Self {
            raw_code: 1,
            candidate_count: 0,
        }
    }

    pub fn is_match(&self) -> bool {
        self.raw_code == 0
    }

    /// Parses the `"<code>,<candidateCount>"` report printed by the oracle binary.
    /// A report with a bare code (no count) reads as a count of zero.
    pub fn parse_report(report: &str) -> Result<Self, OracleError> {
        let report = report.trim();
        let mut fields = report.split(',').map(str::trim);
        let code = fields
            .next()
            .filter(|f| !f.is_empty())
            .and_then(|f| f.parse::<i64>().ok())
            .ok_or_else(|| OracleError::MalformedReport(report.to_string()))?;
        let count = match fields.next() {
            None | Some("") => 0,
            Some(f) => f
                .parse::<u64>()
                .map_err(|_| OracleError::MalformedReport(report.to_string()))?,
        };
        Self::new(code, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report() {
        let v = Verdict::parse_report("0,150").unwrap();
        assert_eq!(v, Verdict::new(0, 150).unwrap());
        assert!(v.is_match());

        let v = Verdict::parse_report(" -1,0\n").unwrap();
        assert_eq!(v.raw_code, -1);
        assert_eq!(v.candidate_count, 0);

        let v = Verdict::parse_report("37,37").unwrap();
        assert_eq!(v.raw_code, 37);
        assert!(!v.is_match());

        assert_eq!(Verdict::parse_report("-2").unwrap().candidate_count, 0);
    }

    #[test]
    fn test_parse_report_rejects_garbage() {
        assert!(matches!(
            Verdict::parse_report(""),
            Err(OracleError::MalformedReport(_))
        ));
        assert!(matches!(
            Verdict::parse_report("Runtime: 0.3 seconds"),
            Err(OracleError::MalformedReport(_))
        ));
        assert!(matches!(
            Verdict::parse_report("0,many"),
            Err(OracleError::MalformedReport(_))
        ));
        assert!(matches!(
            Verdict::parse_report("-4,0"),
            Err(OracleError::UnknownVerdict(-4))
        ));
    }

    #[test]
    fn test_params_defaults() {
        let p = OracleParams::new(11, 32, 6, 100, 100).with_worker_budget(8);
        assert_eq!(p.n, 64);
        assert_eq!(p.worker_budget, 8);
        assert_eq!(p.state_space(), 2048);
        assert!(p.plaintext.is_none());
    }
}
