use std::collections::HashMap;

use brm_oracle::{Oracle, OracleError, OracleParams, Verdict};
use parking_lot::Mutex;

type Rule = Box<dyn Fn(usize, usize) -> Verdict + Send + Sync>;

// ------ Oracle Mock ------
/// Deterministic oracle: answers from per-point overrides first, then from a rule over
/// `(m, k)`. Every call is recorded in order.
pub struct ScriptedOracle {
    rule: Rule,
    points: HashMap<(usize, usize), Verdict>,
    calls: Mutex<Vec<OracleParams>>,
}

impl ScriptedOracle {
    pub fn new<F>(rule: F) -> Self
    where
        F: Fn(usize, usize) -> Verdict + Send + Sync + 'static,
    {
        Self {
            rule: Box::new(rule),
            points: HashMap::new(),
            calls: Mutex::new(vec![]),
        }
    }

    /// Oracle that never finds the true state.
    pub fn never_matching() -> Self {
        Self::new(|_, _| Verdict::no_match())
    }

    pub fn with_point(mut self, m: usize, k: usize, code: i64, count: u64) -> Self {
        let verdict = Verdict::new(code, count).expect("scripted verdict code out of range");
        self.points.insert((m, k), verdict);
        self
    }

    /// `(m, k)` of every call so far, in call order.
    pub fn calls(&self) -> Vec<(usize, usize)> {
        self.calls.lock().iter().map(|p| (p.m, p.k)).collect()
    }
}

impl Oracle for ScriptedOracle {
    fn query(&self, params: &OracleParams) -> Result<Verdict, OracleError> {
        self.calls.lock().push(*params);
        Ok(self
            .points
            .get(&(params.m, params.k))
            .copied()
            .unwrap_or_else(|| (self.rule)(params.m, params.k)))
    }
}
