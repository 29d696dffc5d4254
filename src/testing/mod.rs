//! Test runner
//!
//! [`Context`] is one running test; [`Runner`] wraps it with numbered
//! cases, pass/fail lines and assertions. Table-driven tests describe
//! their rows with [`Case`], built inline or loaded from a file.

mod assert;
mod bench;
mod case;
mod context;
mod diagnostics;
mod report;
mod runner;
mod table;

pub use assert::{Contains, Nullable};
pub use bench::{measure, Bencher, Measurement};
pub use case::{Case, CaseBuilder, ExpectedError, MessageError};
pub use context::{panic_message, run_test, Context, Outcome};
pub use diagnostics::{memory_stats, thread_count, MemoryStats};
pub use report::{Console, Level, Memory, Record, Reporter};
pub use runner::Runner;
pub use table::{load_cases, parse_toml, parse_yaml, CaseRow, CaseTable};
