//! Named scope timings
//!
//! ```
//! use staggerflow::profiler::Profiler;
//! let profiler = Profiler::new();
//! {
//!     let _scope = profiler.scope("work");
//! }
//! assert_eq!(profiler.calls("work"), 1);
//! ```
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Accumulated time of one scope name
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timing {
    /// Number of completed scopes
    pub calls: usize,
    /// Total time spent
    pub total: Duration,
}

/// Collects timings of named scopes of one rank
#[derive(Debug, Default)]
pub struct Profiler {
    timings: RefCell<BTreeMap<&'static str, Timing>>,
}

impl Profiler {
    /// Empty profiler
    pub fn new() -> Self {
        Self::default()
    }

    /// Time until the returned guard is dropped
    pub fn scope(&self, name: &'static str) -> Scope<'_> {
        Scope {
            profiler: self,
            name,
            start: Instant::now(),
        }
    }

    fn record(&self, name: &'static str, elapsed: Duration) {
        let mut timings = self.timings.borrow_mut();
        let timing = timings.entry(name).or_default();
        timing.calls += 1;
        timing.total += elapsed;
    }

    /// Completed scopes of `name`
    pub fn calls(&self, name: &str) -> usize {
        self.timings.borrow().get(name).map_or(0, |t| t.calls)
    }

    /// Snapshot of all timings, ordered by name
    pub fn timings(&self) -> Vec<(&'static str, Timing)> {
        self.timings
            .borrow()
            .iter()
            .map(|(name, timing)| (*name, *timing))
            .collect()
    }

    /// Log all timings
    pub fn report(&self) {
        for (name, timing) in self.timings() {
            log::info!(
                "{:<24} calls: {:>8} total: {:>10.3} s mean: {:>10.3e} s",
                name,
                timing.calls,
                timing.total.as_secs_f64(),
                timing.total.as_secs_f64() / timing.calls.max(1) as f64
            );
        }
    }
}

/// Running scope, records on drop
#[derive(Debug)]
pub struct Scope<'a> {
    profiler: &'a Profiler,
    name: &'static str,
    start: Instant,
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.profiler.record(self.name, self.start.elapsed());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nested_scopes() {
        let profiler = Profiler::new();
        {
            let _outer = profiler.scope("outer");
            for _ in 0..3 {
                let _inner = profiler.scope("inner");
            }
        }
        assert_eq!(profiler.calls("outer"), 1);
        assert_eq!(profiler.calls("inner"), 3);
        assert_eq!(profiler.calls("missing"), 0);
        let timings = profiler.timings();
        assert_eq!(timings[0].0, "inner");
        assert!(timings[1].1.total >= timings[0].1.total);
    }
}
