//! casekit - fluent assertions and table-driven cases for Rust tests
//!
//! Tests get a [`Runner`] that numbers cases, prints a pass/fail line for
//! every check and offers named assertions. Failures either mark the test
//! and continue, or halt it, depending on the assertion.

pub mod common;
pub mod testing;

pub use common::{logging, Error, Result};
pub use testing::{
    load_cases, run_test, Case, CaseBuilder, Console, Context, Memory, Outcome, Reporter,
    Runner,
};
