//! Fluent test runner
//!
//! Wraps a [`Context`] with case numbering, pass/fail lines and named
//! assertions. Every method returns the runner so calls chain:
//!
//! ```
//! use casekit::{run_test, Runner};
//!
//! run_test("addition", |t| {
//!     let mut r = Runner::new(t, "Calculator Tests");
//!     r.case("Testing addition")
//!         .require(2 + 3 == 5, "2 + 3 should equal 5")
//!         .assert_equal(vec![1, 2], vec![1, 2], None);
//! });
//! ```

use std::fmt::{Debug, Display};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::common::color::Markers;
use crate::common::config::Config;

use super::assert::{Contains, Nullable};
use super::bench::{self, Bencher};
use super::case::Case;
use super::context::{panic_message, Context, Outcome};
use super::diagnostics;

/// Runner state shared by a test and all of its subtests
#[derive(Debug, Clone)]
struct Session {
    title: String,
    case_number: usize,
    prefix: String,
    started: Instant,
    markers: Markers,
    bench_time: Duration,
    bench_max_iterations: u64,
}

/// Fluent wrapper around one test context
///
/// Subtests started with [`Runner::run`], [`Runner::caser`] and
/// [`Runner::cases`] hand their callback a runner bound to the subtest's
/// context but carrying the same case counter and timer, so numbering
/// continues across subtests and assertions report against the subtest.
pub struct Runner<'t> {
    session: Session,
    t: &'t mut Context,
}

impl<'t> Runner<'t> {
    /// Bind a runner to a context and announce the suite title
    pub fn new(t: &'t mut Context, title: impl Into<String>) -> Self {
        let runner = Self::wrap(t);
        runner.with_title(title)
    }

    /// Bind a runner to a context without a title or announcement
    pub fn wrap(t: &'t mut Context) -> Self {
        let config = Config::global();
        Self {
            session: Session {
                title: String::new(),
                case_number: 0,
                prefix: String::new(),
                started: Instant::now(),
                markers: Markers::from_config(config),
                bench_time: config.bench_time(),
                bench_max_iterations: config.bench.max_iterations,
            },
            t,
        }
    }

    fn with_title(mut self, title: impl Into<String>) -> Self {
        self.session.title = title.into();
        self.t.log(format!("Test Case => {}", self.session.title));
        self
    }

    /// Use explicit pass/fail markers
    pub fn with_markers(mut self, markers: Markers) -> Self {
        self.session.markers = markers;
        self
    }

    /// Color markers or not, regardless of configuration
    pub fn with_color(self, color: bool) -> Self {
        self.with_markers(Markers::new(color))
    }

    /// Target measuring time for [`Runner::benchmark`]
    pub fn with_bench_time(mut self, time: Duration) -> Self {
        self.session.bench_time = time;
        self
    }

    pub fn title(&self) -> &str {
        &self.session.title
    }

    /// Number of cases announced so far
    pub fn case_number(&self) -> usize {
        self.session.case_number
    }

    /// Prefix of the current case, `"Case N -> "`
    pub fn prefix(&self) -> &str {
        &self.session.prefix
    }

    /// The context assertions currently report to
    pub fn context(&self) -> &Context {
        self.t
    }

    pub fn context_mut(&mut self) -> &mut Context {
        self.t
    }

    // === Cases and subtests ===

    /// Announce the next case
    pub fn case(&mut self, msg: impl Display) -> &mut Self {
        self.session.case_number += 1;
        self.session.prefix = format!("Case {} -> ", self.session.case_number);
        self.t.log(format!("{}{}", self.session.prefix, msg));
        self
    }

    /// Run `f` as a named subtest
    ///
    /// Halts, skips and panics inside `f` end the subtest only; the
    /// runner carries on with the next statement.
    pub fn run(&mut self, name: &str, f: impl FnOnce(&mut Runner<'_>)) -> &mut Self {
        let mut child = self.t.child(name);
        let mut sub = Runner {
            session: self.session.clone(),
            t: &mut child,
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut sub)));
        self.session = sub.session;

        child.absorb(result);
        let outcome = child.finish();
        self.t.join(outcome);
        self
    }

    /// Announce a case named `name` and run it as a subtest of the same name
    pub fn caser(&mut self, name: &str, f: impl FnOnce(&mut Runner<'_>)) -> &mut Self {
        self.case(name);
        self.run(name, f)
    }

    /// Run every case as its own subtest, in order
    ///
    /// A failing case never stops the ones after it.
    pub fn cases<I, W>(
        &mut self,
        cases: &[Case<I, W>],
        mut f: impl FnMut(&Case<I, W>, &mut Runner<'_>),
    ) -> &mut Self {
        for case in cases {
            self.case(case.name());
            self.run(case.name(), |r| f(case, r));
        }
        self
    }

    /// Run branches concurrently, each with its own context and runner
    ///
    /// Branches never share runner state; their verdicts are folded into
    /// this test once all of them finished. Branch contexts are marked
    /// parallel.
    pub fn run_parallel<N, F>(&mut self, branches: impl IntoIterator<Item = (N, F)>) -> &mut Self
    where
        N: Into<String>,
        F: FnOnce(&mut Runner<'_>) + Send,
    {
        self.case("Running branches in parallel");

        let branches: Vec<_> = branches
            .into_iter()
            .map(|(name, f)| {
                let name = name.into();
                let seed = self.t.seed(&name);
                (name, seed, f)
            })
            .collect();
        let markers = &self.session.markers;

        let outcomes: Vec<Outcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = branches
                .into_iter()
                .map(|(name, seed, f)| {
                    scope.spawn(move || {
                        let mut context = seed.into_context();
                        context.parallel();
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            let mut runner =
                                Runner::new(&mut context, name).with_markers(markers.clone());
                            f(&mut runner);
                        }));
                        context.absorb(result);
                        context.finish()
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or(Outcome {
                        failed: true,
                        skipped: false,
                        elapsed: Duration::ZERO,
                    })
                })
                .collect()
        });

        for outcome in outcomes {
            self.t.join(outcome);
        }
        self
    }

    // === Pass/fail primitives ===

    /// Report a plain line
    pub fn log(&mut self, msg: impl Display) -> &mut Self {
        self.t.log(msg);
        self
    }

    /// Report a passed check
    pub fn pass(&mut self, msg: impl Display) -> &mut Self {
        self.t
            .log(format!("\t{} {}", self.session.markers.pass(), msg));
        self
    }

    /// Report a failed check; the test keeps running
    pub fn fail(&mut self, msg: impl Display) -> &mut Self {
        self.t
            .error(format!("\t{} {}", self.session.markers.fail(), msg));
        self
    }

    /// Report a failed check and halt the test
    pub fn fatal(&mut self, msg: impl Display) -> ! {
        self.t
            .fatal(format!("\t{} {}", self.session.markers.fail(), msg))
    }

    /// Pass when `cond` holds, fail otherwise; never halts
    pub fn require(&mut self, cond: bool, desc: impl Display) -> &mut Self {
        if cond {
            self.pass(desc)
        } else {
            self.fail(desc)
        }
    }

    /// Pass when `cond` holds, otherwise fail and halt
    pub fn fail_now(&mut self, cond: bool, desc: impl Display) -> &mut Self {
        if !cond {
            self.fail(desc);
            self.t.fail_now();
        }
        self.pass(desc)
    }

    // === Error assertions ===

    /// Unwrap `result`, halting the test if it is an error
    pub fn assert_no_err<T, E: Display>(&mut self, result: Result<T, E>) -> T {
        self.assert_no_err_msg(result, "error unexpected")
    }

    /// Unwrap `result` with a description of the operation
    pub fn assert_no_err_msg<T, E: Display>(&mut self, result: Result<T, E>, desc: impl Display) -> T {
        match result {
            Ok(value) => {
                self.pass(desc);
                value
            }
            Err(e) => {
                self.fail(desc);
                self.t.log(format!("requires no error, but found: {}", e));
                self.t.fail_now()
            }
        }
    }

    /// Extract the error from `result`, halting the test if it succeeded
    pub fn assert_err<T, E>(&mut self, result: Result<T, E>) -> E {
        self.assert_err_msg(result, "error expected")
    }

    /// Extract the error from `result` with a description of what was expected
    pub fn assert_err_msg<T, E>(&mut self, result: Result<T, E>, desc: impl Display) -> E {
        match result {
            Err(e) => {
                self.pass(desc);
                e
            }
            Ok(_) => {
                self.fail(desc);
                self.t.log("requires error, but found nil");
                self.t.fail_now()
            }
        }
    }

    // === Value assertions ===

    /// Structural equality through `PartialEq`
    pub fn assert_equal<A, B>(&mut self, expected: A, actual: B, msg: Option<&str>) -> &mut Self
    where
        A: PartialEq<B> + Debug,
        B: Debug,
    {
        if expected == actual {
            self.pass("Values are equal")
        } else {
            let message = message_or(msg, || format!("Expected {:?}, got {:?}", expected, actual));
            self.fail(message)
        }
    }

    pub fn assert_not_equal<A, B>(&mut self, expected: A, actual: B, msg: Option<&str>) -> &mut Self
    where
        A: PartialEq<B> + Debug,
        B: Debug,
    {
        if expected != actual {
            self.pass("Values are not equal")
        } else {
            let message = message_or(msg, || {
                format!("Expected values to be different, but both are {:?}", expected)
            });
            self.fail(message)
        }
    }

    /// Nil check; see [`Nullable`] for what counts as nil
    pub fn assert_nil<T: Nullable + Debug>(&mut self, value: T, msg: Option<&str>) -> &mut Self {
        if value.is_nil() {
            self.pass("Value is nil")
        } else {
            let message = message_or(msg, || format!("Expected nil, got {:?}", value));
            self.fail(message)
        }
    }

    pub fn assert_not_nil<T: Nullable>(&mut self, value: T, msg: Option<&str>) -> &mut Self {
        if value.is_nil() {
            let message = message_or(msg, || "Expected non-nil value, got nil".to_string());
            self.fail(message)
        } else {
            self.pass("Value is not nil")
        }
    }

    pub fn assert_true(&mut self, condition: bool, msg: Option<&str>) -> &mut Self {
        if condition {
            self.pass("Condition is true")
        } else {
            let message = message_or(msg, || "Expected condition to be true".to_string());
            self.fail(message)
        }
    }

    pub fn assert_false(&mut self, condition: bool, msg: Option<&str>) -> &mut Self {
        if !condition {
            self.pass("Condition is false")
        } else {
            let message = message_or(msg, || "Expected condition to be false".to_string());
            self.fail(message)
        }
    }

    /// Substring or element search; see [`Contains`]
    pub fn assert_contains<C, I>(&mut self, container: &C, item: &I, msg: Option<&str>) -> &mut Self
    where
        C: Contains<I> + Debug + ?Sized,
        I: Debug + ?Sized,
    {
        if container.contains_item(item) {
            self.pass("Container contains item")
        } else {
            let message =
                message_or(msg, || format!("Expected {:?} to contain {:?}", container, item));
            self.fail(message)
        }
    }

    pub fn assert_not_contains<C, I>(
        &mut self,
        container: &C,
        item: &I,
        msg: Option<&str>,
    ) -> &mut Self
    where
        C: Contains<I> + Debug + ?Sized,
        I: Debug + ?Sized,
    {
        if !container.contains_item(item) {
            self.pass("Container does not contain item")
        } else {
            let message = message_or(msg, || {
                format!("Expected {:?} not to contain {:?}", container, item)
            });
            self.fail(message)
        }
    }

    /// Pass when `f` panics
    pub fn assert_panics(&mut self, f: impl FnOnce(), msg: Option<&str>) -> &mut Self {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Err(_) => self.pass("Function panicked as expected"),
            Ok(()) => {
                let message = message_or(msg, || "Expected function to panic".to_string());
                self.fail(message)
            }
        }
    }

    /// Pass when `f` returns normally
    pub fn assert_not_panics(&mut self, f: impl FnOnce(), msg: Option<&str>) -> &mut Self {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(()) => self.pass("Function did not panic"),
            Err(payload) => {
                let message = message_or(msg, || {
                    format!(
                        "Expected function not to panic, but it panicked with {}",
                        panic_message(payload.as_ref())
                    )
                });
                self.fail(message)
            }
        }
    }

    // === Timing and diagnostics ===

    /// Reset the timer baseline
    pub fn start_timer(&mut self) -> &mut Self {
        self.session.started = Instant::now();
        self.case("Starting test timer")
    }

    /// Announce the time since the baseline
    pub fn stop_timer(&mut self) -> &mut Self {
        let duration = self.session.started.elapsed();
        self.case(format!("Test completed in {:?}", duration))
    }

    /// Time since construction or the last [`Runner::start_timer`]
    pub fn elapsed(&self) -> Duration {
        self.session.started.elapsed()
    }

    /// Measure `f` in a subtest and report iterations and ns/op
    pub fn benchmark(&mut self, name: &str, mut f: impl FnMut(&mut Bencher)) -> &mut Self {
        self.case(format!("Benchmark: {}", name));

        let target = self.session.bench_time;
        let max = self.session.bench_max_iterations;
        self.run(name, |r| {
            let measurement = bench::measure(target, max, &mut f);
            r.log(format!("{}: {}", name, measurement));
        });
        self
    }

    /// Announce and log the process memory figures
    pub fn memory_usage(&mut self) -> &mut Self {
        self.case("Memory Usage");
        match diagnostics::memory_stats() {
            Ok(stats) => {
                self.log(format!("Resident: {}", kilobytes(stats.resident_kb)));
                self.log(format!("Peak resident: {}", kilobytes(stats.peak_resident_kb)));
                self.log(format!("Virtual: {}", kilobytes(stats.virtual_kb)))
            }
            Err(e) => self.log(format!("Memory usage unavailable: {}", e)),
        }
    }

    /// Announce the number of threads in the process
    pub fn thread_count(&mut self) -> &mut Self {
        let count = diagnostics::thread_count();
        self.case(format!("Thread count: {}", count))
    }

    /// Announce a summary of the test and process state
    pub fn test_info(&mut self) -> &mut Self {
        self.case("Test Information");
        let name = self.t.name().to_string();
        let elapsed = self.elapsed();
        let parallel = self.t.is_parallel();
        self.log(format!("Test Name: {}", name))
            .log(format!("Duration: {:?}", elapsed))
            .log(format!("Parallel: {}", parallel))
            .thread_count()
            .memory_usage()
    }

    // === Context pass-throughs ===

    /// Mark the test as running in parallel with its siblings
    pub fn parallel(&mut self) -> &mut Self {
        self.t.parallel();
        self.case("Test marked as parallel")
    }

    /// Announce the reason and skip the rest of the test
    pub fn skip(&mut self, reason: impl Display) -> ! {
        let reason = reason.to_string();
        self.case(format!("Skipping test: {}", reason));
        self.t.skip(reason)
    }

    pub fn skip_if(&mut self, condition: bool, reason: impl Display) -> &mut Self {
        if condition {
            self.skip(reason);
        }
        self
    }

    pub fn skip_unless(&mut self, condition: bool, reason: impl Display) -> &mut Self {
        if !condition {
            self.skip(reason);
        }
        self
    }

    /// Register a function to run when the current test finishes
    pub fn cleanup(&mut self, f: impl FnOnce() + 'static) -> &mut Self {
        self.t.cleanup(f);
        self.case("Cleanup function registered")
    }

    #[track_caller]
    pub fn helper(&mut self) -> &mut Self {
        self.t.helper();
        self
    }

    /// Fresh temporary directory, removed when the current test finishes
    pub fn temp_dir(&mut self) -> PathBuf {
        self.t.temp_dir()
    }

    /// Set an environment variable until the current test finishes
    pub fn setenv(&mut self, key: &str, value: &str) -> &mut Self {
        self.t.setenv(key, value);
        self.case(format!("Environment variable set: {}={}", key, value))
    }

    pub fn getenv(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.t.deadline()
    }
}

fn message_or(msg: Option<&str>, default: impl FnOnce() -> String) -> String {
    msg.map(str::to_string).unwrap_or_else(default)
}

fn kilobytes(value: Option<u64>) -> String {
    value
        .map(|kb| format!("{} KB", kb))
        .unwrap_or_else(|| "unavailable".to_string())
}
