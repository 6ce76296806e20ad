//! # Oracle boundary
//!
//! The oracle is the external routine that, given the cipher and search parameters of one
//! `(m, k)` point, tries to recover the initial state of the clocked register and reports a
//! categorical verdict. This crate does not know how the oracle searches. It only knows how to
//! call it and how to read what comes back.
//!
//! Two interchangeable backends implement [`Oracle`]:
//!
//! - [`ProcessOracle`] runs the oracle binary as a subprocess, either reading a
//!   `"<code>,<count>"` report from its standard output or interpreting its exit status.
//! - [`InProcessOracle`] wraps a callable returning a bare verdict code, the shape of a direct
//!   foreign call into a linked search routine.
//!
//! Callers (the search controller and the sweep executor) only ever see `dyn Oracle` or a generic
//! `O: Oracle`, so they are backend-agnostic.

pub mod build;
pub mod error;
pub mod inproc;
pub mod params;
pub mod process;

use auto_impl::auto_impl;

pub use build::BuildHook;
pub use error::OracleError;
pub use inproc::InProcessOracle;
pub use params::{OracleParams, Verdict};
pub use process::{ProcessOracle, ProcessProtocol};

/// A single capability: evaluate one parameter point and return the raw verdict.
///
/// Implementations must be callable from many worker threads at once.
#[auto_impl(&, Arc, Box)]
pub trait Oracle: Send + Sync {
    /// Evaluate one `(m, k)` point.
    ///
    /// # Errors
    /// Returns an error when the oracle could not be invoked or its answer could not be read.
    /// Callers treat such failures as a normal "no match" outcome, not as a fault of the run.
    fn query(&self, params: &OracleParams) -> Result<Verdict, OracleError>;
}
