//! Output sinks for test contexts
//!
//! Every line a context produces becomes a [`Record`] handed to a
//! [`Reporter`]. The console reporter prints through `println!` so libtest
//! captures it per test; the memory reporter keeps records for inspection.

use std::sync::{Arc, Mutex, MutexGuard};

/// Severity of a reported line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Plain log line, does not affect the verdict
    Info,
    /// Line reported together with a failure
    Error,
    /// Line reported when a test is skipped
    Skip,
}

/// One line of test output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Full test path, subtests joined with `/`
    pub test: String,
    /// Subtest nesting depth, 0 for the top-level test
    pub depth: usize,
    pub level: Level,
    pub message: String,
}

/// Destination for test output
pub trait Reporter: Send + Sync {
    fn report(&self, record: &Record);
}

/// Prints records to stdout, indented by subtest depth
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl Reporter for Console {
    fn report(&self, record: &Record) {
        let indent = "    ".repeat(record.depth);
        for line in record.message.lines() {
            println!("{}{}", indent, line);
        }
    }
}

/// Keeps records in memory; clones share the same buffer
#[derive(Debug, Default, Clone)]
pub struct Memory {
    records: Arc<Mutex<Vec<Record>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Messages in report order
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.message.clone()).collect()
    }

    /// Messages reported at error level
    pub fn errors(&self) -> Vec<String> {
        self.with_level(Level::Error)
    }

    /// Lines carrying the pass marker
    pub fn passes(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|r| r.level == Level::Info && r.message.contains('\u{2713}'))
            .map(|r| r.message.clone())
            .collect()
    }

    /// Lines carrying the fail marker
    pub fn failures(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|r| r.level == Level::Error && r.message.contains('\u{2717}'))
            .map(|r| r.message.clone())
            .collect()
    }

    /// Drop everything recorded so far
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn with_level(&self, level: Level) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|r| r.level == level)
            .map(|r| r.message.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        // A panicking reporter thread must not hide the records of the others
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Reporter for Memory {
    fn report(&self, record: &Record) {
        self.lock().push(record.clone());
    }
}
