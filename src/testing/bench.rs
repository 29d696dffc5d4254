//! Benchmark timing loop
//!
//! The body is called with a growing iteration count until a single run
//! takes at least the target time. The last run is the measurement.

use std::time::{Duration, Instant};

/// Handed to a benchmark body; the body repeats its work `iterations()` times
#[derive(Debug)]
pub struct Bencher {
    iterations: u64,
    elapsed: Duration,
    timer_on: bool,
    started: Instant,
}

impl Bencher {
    fn new(iterations: u64) -> Self {
        Self {
            iterations,
            elapsed: Duration::ZERO,
            timer_on: false,
            started: Instant::now(),
        }
    }

    /// How many times the body should repeat its work
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Run `f` once per iteration
    pub fn iter<T>(&mut self, mut f: impl FnMut() -> T) {
        for _ in 0..self.iterations {
            std::hint::black_box(f());
        }
    }

    /// Resume timing after `stop_timer`
    pub fn start_timer(&mut self) {
        if !self.timer_on {
            self.started = Instant::now();
            self.timer_on = true;
        }
    }

    /// Pause timing, for setup work the measurement should not include
    pub fn stop_timer(&mut self) {
        if self.timer_on {
            self.elapsed += self.started.elapsed();
            self.timer_on = false;
        }
    }

    /// Discard the time measured so far
    pub fn reset_timer(&mut self) {
        self.elapsed = Duration::ZERO;
        if self.timer_on {
            self.started = Instant::now();
        }
    }

    fn measured(&self) -> Duration {
        if self.timer_on {
            self.elapsed + self.started.elapsed()
        } else {
            self.elapsed
        }
    }
}

/// Result of a benchmark
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub iterations: u64,
    pub elapsed: Duration,
}

impl Measurement {
    /// Average time per iteration in nanoseconds
    pub fn ns_per_op(&self) -> u128 {
        if self.iterations == 0 {
            return 0;
        }
        self.elapsed.as_nanos() / u128::from(self.iterations)
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} iterations, {} ns/op", self.iterations, self.ns_per_op())
    }
}

/// Run `body` with growing iteration counts until a run lasts `target`
pub fn measure(target: Duration, max_iterations: u64, mut body: impl FnMut(&mut Bencher)) -> Measurement {
    let mut iterations = 1u64;
    loop {
        let mut bencher = Bencher::new(iterations);
        bencher.start_timer();
        body(&mut bencher);
        bencher.stop_timer();
        let elapsed = bencher.measured();

        if elapsed >= target || iterations >= max_iterations {
            return Measurement { iterations, elapsed };
        }
        iterations = next_iterations(iterations, elapsed, target, max_iterations);
    }
}

/// Predict the iteration count that fills `target`
///
/// Overshoots the prediction by 20%, grows at least by one and at most
/// a hundredfold per round.
fn next_iterations(current: u64, elapsed: Duration, target: Duration, max: u64) -> u64 {
    let per_op = (elapsed.as_nanos() / u128::from(current)).max(1);
    let predicted = target.as_nanos() * 6 / 5 / per_op;
    let predicted = u64::try_from(predicted).unwrap_or(u64::MAX);

    predicted
        .min(current.saturating_mul(100))
        .max(current + 1)
        .min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_reaches_target() {
        let target = Duration::from_millis(5);
        let result = measure(target, u64::MAX, |b| {
            b.iter(|| std::thread::sleep(Duration::from_micros(50)));
        });
        assert!(result.elapsed >= target);
        assert!(result.iterations > 1);
        assert!(result.ns_per_op() >= 50_000);
    }

    #[test]
    fn test_measure_respects_iteration_cap() {
        let result = measure(Duration::from_secs(60), 1_000, |b| b.iter(|| 1 + 1));
        assert_eq!(result.iterations, 1_000);
    }

    #[test]
    fn test_stopped_timer_excludes_setup() {
        let result = measure(Duration::ZERO, 1, |b| {
            b.stop_timer();
            std::thread::sleep(Duration::from_millis(20));
            b.start_timer();
        });
        assert!(result.elapsed < Duration::from_millis(20));
    }

    #[test]
    fn test_next_iterations_growth_bounds() {
        let target = Duration::from_secs(1);
        // Very fast ops are capped at a hundredfold growth
        assert_eq!(next_iterations(1, Duration::from_nanos(1), target, u64::MAX), 100);
        // Slow ops still grow by at least one
        assert_eq!(next_iterations(3, Duration::from_millis(900), target, u64::MAX), 4);
        assert_eq!(next_iterations(10, Duration::from_nanos(10), target, 50), 50);
    }

    #[test]
    fn test_measurement_display() {
        let m = Measurement {
            iterations: 4,
            elapsed: Duration::from_nanos(400),
        };
        assert_eq!(m.to_string(), "4 iterations, 100 ns/op");
    }
}
