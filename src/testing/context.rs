//! Test execution context
//!
//! A [`Context`] is one running test or subtest. It is where failures are
//! recorded, where halting and skipping unwind to, and where cleanups,
//! temporary directories and scoped environment variables live until the
//! test finishes.
//!
//! Halting uses `std::panic::resume_unwind` with a private payload, so the
//! panic hook stays quiet and the enclosing subtest boundary (or
//! [`run_test`]) can tell a halt apart from a genuine panic.

use std::any::Any;
use std::ffi::OsString;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::common::config::Config;

use super::report::{Console, Level, Record, Reporter};

/// Unwind payload for a halted test
struct Halt;

/// Unwind payload for a skipped test
struct Skipped;

/// Final verdict of a test or subtest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub failed: bool,
    pub skipped: bool,
    pub elapsed: Duration,
}

impl Outcome {
    pub fn passed(&self) -> bool {
        !self.failed && !self.skipped
    }
}

/// One running test or subtest
///
/// A top-level context should end through [`run_test`], [`Context::scope`]
/// or [`Context::finish`]. Dropping a failed one without that panics, so
/// the enclosing `#[test]` still fails.
pub struct Context {
    name: String,
    depth: usize,
    failed: bool,
    skipped: bool,
    parallel: bool,
    started: Instant,
    deadline: Option<Instant>,
    reporter: Arc<dyn Reporter>,
    cleanups: Vec<Box<dyn FnOnce()>>,
    temp_dirs: Vec<TempDir>,
    outcome: Option<Outcome>,
    /// Verdict handed to a caller through `finish` or `scope`
    reported: bool,
}

/// Everything a child context inherits from its parent
///
/// Unlike `Context` this is `Send`, so parallel branches build their
/// contexts on their own threads.
pub(crate) struct Seed {
    name: String,
    depth: usize,
    parallel: bool,
    deadline: Option<Instant>,
    reporter: Arc<dyn Reporter>,
}

impl Seed {
    pub(crate) fn into_context(self) -> Context {
        let context = Context {
            name: self.name,
            depth: self.depth,
            failed: false,
            skipped: false,
            parallel: self.parallel,
            started: Instant::now(),
            deadline: self.deadline,
            reporter: self.reporter,
            cleanups: Vec::new(),
            temp_dirs: Vec::new(),
            outcome: None,
            reported: false,
        };
        tracing::debug!("Starting subtest {}", context.name);
        context.emit(
            context.depth - 1,
            Level::Info,
            format!("=== RUN   {}", context.name),
        );
        context
    }
}

impl Context {
    /// Create a top-level context printing to stdout
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_reporter(name, Arc::new(Console))
    }

    /// Create a top-level context reporting to the given sink
    pub fn with_reporter(name: impl Into<String>, reporter: Arc<dyn Reporter>) -> Self {
        let started = Instant::now();
        Self {
            name: name.into(),
            depth: 0,
            failed: false,
            skipped: false,
            parallel: false,
            started,
            deadline: Config::global().test_timeout().map(|t| started + t),
            reporter,
            cleanups: Vec::new(),
            temp_dirs: Vec::new(),
            outcome: None,
            reported: false,
        }
    }

    /// Replace the deadline reported by [`Context::deadline`]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Full test path, subtests joined with `/`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subtest nesting depth, 0 for a top-level test
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Time since the context was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Report a line of output
    pub fn log(&self, msg: impl Display) {
        self.emit(self.depth, Level::Info, msg.to_string());
    }

    /// Report a line and mark the test failed; execution continues
    pub fn error(&mut self, msg: impl Display) {
        self.emit(self.depth, Level::Error, msg.to_string());
        self.failed = true;
    }

    /// Report a line, mark the test failed and halt it
    pub fn fatal(&mut self, msg: impl Display) -> ! {
        self.error(msg);
        self.fail_now()
    }

    /// Mark the test failed without reporting anything
    pub fn fail(&mut self) {
        self.failed = true;
    }

    /// Mark the test failed and stop executing it
    pub fn fail_now(&mut self) -> ! {
        self.failed = true;
        tracing::debug!("Halting {}", self.name);
        panic::resume_unwind(Box::new(Halt))
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Report a line and stop executing the test as skipped
    pub fn skip(&mut self, msg: impl Display) -> ! {
        self.emit(self.depth, Level::Skip, msg.to_string());
        self.skip_now()
    }

    /// Stop executing the test as skipped
    pub fn skip_now(&mut self) -> ! {
        self.skipped = true;
        tracing::debug!("Skipping {}", self.name);
        panic::resume_unwind(Box::new(Skipped))
    }

    pub fn skipped(&self) -> bool {
        self.skipped
    }

    /// Run `f` as a named subtest, returning whether it passed
    ///
    /// Halts, skips and panics inside `f` end the subtest only. A failed
    /// subtest marks this context failed too.
    pub fn run(&mut self, name: &str, f: impl FnOnce(&mut Context)) -> bool {
        let mut child = self.child(name);
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut child)));
        child.absorb(result);
        self.join(child.finish())
    }

    /// Run `f` as the body of this context and finish it
    pub fn scope(mut self, f: impl FnOnce(&mut Context)) -> Outcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut self)));
        self.absorb(result);
        self.finish()
    }

    /// Mark the test as running in parallel with its siblings
    ///
    /// Subtests inherit the mark; it forbids [`Context::setenv`].
    pub fn parallel(&mut self) {
        self.parallel = true;
        tracing::debug!("{} marked parallel", self.name);
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Register a function to run when the test finishes
    ///
    /// Cleanups run in reverse registration order, after the body and
    /// after any subtests.
    pub fn cleanup(&mut self, f: impl FnOnce() + 'static) {
        self.cleanups.push(Box::new(f));
    }

    /// Mark the caller as a test helper
    #[track_caller]
    pub fn helper(&self) {
        tracing::trace!(
            "{} registered helper at {}",
            self.name,
            std::panic::Location::caller()
        );
    }

    /// Create a fresh temporary directory removed when the test finishes
    ///
    /// Halts the test when the directory cannot be created.
    pub fn temp_dir(&mut self) -> PathBuf {
        let prefix = format!("{}-", sanitize(&self.name));
        match tempfile::Builder::new().prefix(&prefix).tempdir() {
            Ok(dir) => {
                let path = dir.path().to_path_buf();
                self.temp_dirs.push(dir);
                path
            }
            Err(e) => self.fatal(format!("TempDir: {}", e)),
        }
    }

    /// Set an environment variable until the test finishes
    ///
    /// The previous value is restored by a cleanup. Halts the test when
    /// it runs in parallel, since the environment is process-wide.
    pub fn setenv(&mut self, key: &str, value: &str) {
        if self.parallel {
            self.fatal(format!(
                "setenv {}: cannot set environment variables in parallel tests",
                key
            ));
        }

        let previous: Option<OsString> = std::env::var_os(key);
        std::env::set_var(key, value);

        let key = key.to_string();
        self.cleanup(move || match previous {
            Some(value) => std::env::set_var(&key, value),
            None => std::env::remove_var(&key),
        });
    }

    /// When the test is considered timed out, if a timeout is configured
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Run cleanups, remove temp dirs and report the verdict
    ///
    /// Idempotent: later calls return the first outcome. The caller takes
    /// over the verdict; a failed top-level context that is dropped without
    /// being finished panics instead.
    pub fn finish(&mut self) -> Outcome {
        self.reported = true;
        self.complete()
    }

    fn complete(&mut self) -> Outcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }

        while let Some(cleanup) = self.cleanups.pop() {
            tracing::trace!("Running cleanup for {}", self.name);
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(cleanup)) {
                if !is_signal(payload.as_ref()) {
                    self.error(format!("panic in cleanup: {}", panic_message(payload.as_ref())));
                }
            }
        }

        for dir in self.temp_dirs.drain(..) {
            let path = dir.path().display().to_string();
            if let Err(e) = dir.close() {
                tracing::warn!("Failed to remove temp dir {}: {}", path, e);
            }
        }

        let outcome = Outcome {
            failed: self.failed,
            skipped: self.skipped && !self.failed,
            elapsed: self.started.elapsed(),
        };

        if self.depth > 0 {
            let verdict = if outcome.failed {
                "FAIL"
            } else if outcome.skipped {
                "SKIP"
            } else {
                "PASS"
            };
            self.emit(
                self.depth - 1,
                Level::Info,
                format!(
                    "--- {}: {} ({:.2}s)",
                    verdict,
                    self.name,
                    outcome.elapsed.as_secs_f64()
                ),
            );
        }
        tracing::debug!("Finished {}: {:?}", self.name, outcome);

        self.outcome = Some(outcome);
        outcome
    }

    pub(crate) fn seed(&self, name: &str) -> Seed {
        Seed {
            name: format!("{}/{}", self.name, name),
            depth: self.depth + 1,
            parallel: self.parallel,
            deadline: self.deadline,
            reporter: Arc::clone(&self.reporter),
        }
    }

    pub(crate) fn child(&self, name: &str) -> Context {
        self.seed(name).into_context()
    }

    /// Fold a finished child's verdict into this context
    pub(crate) fn join(&mut self, child: Outcome) -> bool {
        if child.failed {
            self.failed = true;
        }
        !child.failed
    }

    /// Record how the body of this context ended
    pub(crate) fn absorb(&mut self, result: std::thread::Result<()>) {
        let Err(payload) = result else {
            return;
        };

        if payload.is::<Halt>() {
            self.failed = true;
        } else if payload.is::<Skipped>() {
            self.skipped = true;
        } else {
            self.error(format!("panic: {}", panic_message(payload.as_ref())));
        }
    }

    fn emit(&self, depth: usize, level: Level, message: String) {
        self.reporter.report(&Record {
            test: self.name.clone(),
            depth,
            level,
            message,
        });
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let outcome = self.complete();
        if outcome.failed && self.depth == 0 && !self.reported && !std::thread::panicking() {
            panic!("test '{}' failed", self.name);
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("depth", &self.depth)
            .field("failed", &self.failed)
            .field("skipped", &self.skipped)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

/// Run `f` as a top-level test
///
/// Call this from a `#[test]` function. Failures recorded on the context
/// (including halts) make the test panic once cleanups have run, which is
/// how libtest learns about them. Skipped tests return normally.
pub fn run_test(name: &str, f: impl FnOnce(&mut Context)) {
    let outcome = Context::new(name).scope(f);
    if outcome.failed {
        panic!("test '{}' failed", name);
    }
}

/// Text of a panic payload, when it carries one
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if payload.is::<Halt>() {
        "test halted".to_string()
    } else if payload.is::<Skipped>() {
        "test skipped".to_string()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Whether a payload is a halt or skip rather than a real panic
pub(crate) fn is_signal(payload: &(dyn Any + Send)) -> bool {
    payload.is::<Halt>() || payload.is::<Skipped>()
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::report::Memory;
    use std::cell::Cell;
    use std::rc::Rc;

    fn context(name: &str) -> (Context, Memory) {
        let memory = Memory::new();
        let context = Context::with_reporter(name, Arc::new(memory.clone()));
        (context, memory)
    }

    #[test]
    fn test_error_marks_failed_and_continues() {
        let (context, memory) = context("errors");
        let reached = Rc::new(Cell::new(false));
        let flag = Rc::clone(&reached);
        let outcome = context.scope(|t| {
            t.error("first");
            flag.set(true);
        });
        assert!(outcome.failed);
        assert!(reached.get());
        assert_eq!(memory.errors(), vec!["first"]);
    }

    #[test]
    fn test_fatal_halts_body() {
        let (context, _memory) = context("fatal");
        let reached = Rc::new(Cell::new(false));
        let flag = Rc::clone(&reached);
        let outcome = context.scope(|t| {
            if !flag.get() {
                t.fatal("stop here");
            }
            flag.set(true);
        });
        assert!(outcome.failed);
        assert!(!reached.get());
    }

    #[test]
    fn test_subtest_failure_propagates_and_siblings_run() {
        let (context, memory) = context("parent");
        let (mut first, mut second) = (true, false);
        let outcome = context.scope(|t| {
            first = t.run("bad", |t| t.fatal("broken"));
            second = t.run("good", |t| t.log("fine"));
        });
        assert!(outcome.failed);
        assert!(!first);
        assert!(second);

        let messages = memory.messages();
        assert!(messages.contains(&"=== RUN   parent/bad".to_string()));
        assert!(messages.iter().any(|m| m.starts_with("--- FAIL: parent/bad")));
        assert!(messages.iter().any(|m| m.starts_with("--- PASS: parent/good")));
    }

    #[test]
    fn test_panic_in_subtest_is_a_failure() {
        let (context, memory) = context("panics");
        let outcome = context.scope(|t| {
            t.run("explodes", |_| panic!("kaboom"));
        });
        assert!(outcome.failed);
        assert!(memory.errors().contains(&"panic: kaboom".to_string()));
    }

    #[test]
    fn test_skip_is_not_a_failure() {
        let (context, memory) = context("skips");
        let outcome = context.scope(|t| {
            t.run("skipped", |t| t.skip("not today"));
        });
        assert!(!outcome.failed);
        assert!(memory
            .messages()
            .iter()
            .any(|m| m.starts_with("--- SKIP: skips/skipped")));

        let (context, _memory) = self::context("root skip");
        let outcome = context.scope(|t| t.skip_now());
        assert!(outcome.skipped);
        assert!(!outcome.passed());
    }

    #[test]
    fn test_cleanups_run_in_reverse_order() {
        let (context, _memory) = context("cleanups");
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let (a, b) = (Rc::clone(&order), Rc::clone(&order));
        let outcome = context.scope(|t| {
            t.cleanup(move || a.borrow_mut().push("first"));
            t.cleanup(move || b.borrow_mut().push("second"));
        });
        assert!(outcome.passed());
        assert_eq!(*order.borrow(), vec!["second", "first"]);
    }

    #[test]
    fn test_cleanups_run_after_halt() {
        let (context, _memory) = context("cleanup after halt");
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        context.scope(|t| {
            t.cleanup(move || flag.set(true));
            t.fail_now();
        });
        assert!(ran.get());
    }

    #[test]
    fn test_temp_dir_removed_on_finish() {
        let (mut context, _memory) = context("temp dir");
        let dir = context.temp_dir();
        assert!(dir.is_dir());
        assert_ne!(context.temp_dir(), dir);
        context.finish();
        assert!(!dir.exists());
    }

    #[test]
    fn test_setenv_restores_previous_value() {
        let key = "CASEKIT_CONTEXT_SETENV_TEST";
        std::env::remove_var(key);
        let (context, _memory) = context("setenv");
        let mut inside = None;
        context.scope(|t| {
            t.setenv(key, "inside");
            inside = std::env::var(key).ok();
        });
        assert_eq!(inside.as_deref(), Some("inside"));
        assert!(std::env::var(key).is_err());
    }

    #[test]
    fn test_setenv_refused_in_parallel() {
        let (context, memory) = context("parallel setenv");
        let outcome = context.scope(|t| {
            t.parallel();
            t.run("child", |t| t.setenv("CASEKIT_NEVER_SET", "x"));
        });
        assert!(outcome.failed);
        assert!(std::env::var("CASEKIT_NEVER_SET").is_err());
        assert!(memory.errors()[0].contains("parallel"));
    }

    #[test]
    fn test_deadline_override() {
        let at = Instant::now() + Duration::from_secs(60);
        let (context, _memory) = context("deadline");
        let context = context.with_deadline(Some(at));
        assert_eq!(context.deadline(), Some(at));
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "Box<dyn Any>");
    }

    #[test]
    #[should_panic(expected = "test 'standalone' failed")]
    fn test_dropping_failed_root_panics() {
        let (mut context, _memory) = context("standalone");
        context.error("mismatch");
    }

    #[test]
    fn test_dropping_finished_root_is_quiet() {
        let (mut context, _memory) = context("finished");
        context.error("mismatch");
        assert!(context.finish().failed);
    }

    #[test]
    fn test_dropping_failed_child_is_quiet() {
        let (mut context, _memory) = context("parent");
        let child_failed = {
            let mut child = context.child("child");
            child.error("mismatch");
            child.failed()
        };
        assert!(child_failed);
        assert!(!context.failed());
    }

    #[test]
    #[should_panic(expected = "test 'fails' failed")]
    fn test_run_test_panics_on_failure() {
        run_test("fails", |t| t.error("nope"));
    }

    #[test]
    fn test_run_test_returns_when_skipped() {
        run_test("skipped", |t| t.skip("later"));
    }
}
