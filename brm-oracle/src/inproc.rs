use crate::error::OracleError;
use crate::params::{OracleParams, Verdict};
use crate::Oracle;

/// In-process backend: a callable that returns a bare verdict code, as a direct call into a
/// linked search routine does. Such a routine reports no candidate count, so it is always zero.
pub struct InProcessOracle<F>
where
    F: Fn(&OracleParams) -> i32 + Send + Sync,
{
    search: F,
}

impl<F> InProcessOracle<F>
where
    F: Fn(&OracleParams) -> i32 + Send + Sync,
{
    pub fn new(search: F) -> Self {
        Self { search }
    }
}

impl<F> Oracle for InProcessOracle<F>
where
    F: Fn(&OracleParams) -> i32 + Send + Sync,
{
    fn query(&self, params: &OracleParams) -> Result<Verdict, OracleError> {
        Verdict::new((self.search)(params) as i64, 0)
    }
}
