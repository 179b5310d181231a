//! Timing and progress reporting.

use std::{
    fmt,
    sync::Mutex,
    time::{Duration, Instant},
};

/// A timer that measures and averages the time an operation takes.
///
/// Displaying the timer with `{}` prints the number of recorded measurements and their average.
pub struct Timer {
    name: &'static str,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    total: Duration,
    count: u32,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State::default()),
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is measured and recorded.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    /// Returns the number of recorded measurements.
    pub fn count(&self) -> u32 {
        self.lock().count
    }

    /// Returns the average recorded duration, or zero if nothing was recorded yet.
    pub fn average(&self) -> Duration {
        let state = self.lock();
        state.total.checked_div(state.count).unwrap_or_default()
    }

    fn stop(&self, start: Instant) {
        let mut state = self.lock();
        state.total += start.elapsed();
        state.count += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // The state is plain data that is always left consistent, so a poisoned lock is still
        // usable.
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.count();
        let avg_ms = self.average().as_secs_f32() * 1000.0;
        write!(f, "{}: {count}x{avg_ms:.01}ms", self.name)
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

/// Logs the progress of a batch of work items.
pub struct Progress {
    name: String,
    done: usize,
    total: usize,
    start: Instant,
}

impl Progress {
    pub fn new<N: Into<String>>(name: N, total: usize) -> Self {
        Self {
            name: name.into(),
            done: 0,
            total,
            start: Instant::now(),
        }
    }

    /// Marks one more item as finished and logs the new state, including `item`.
    pub fn tick(&mut self, item: impl fmt::Display) {
        self.done += 1;
        log::info!("{}: {}/{} ({item})", self.name, self.done, self.total);
    }

    /// Marks one more item as finished, logging only every `every`th item and the last one.
    ///
    /// Use this for large batches where logging every item would be noise.
    pub fn tick_quiet(&mut self, every: usize) {
        self.done += 1;
        if self.done == self.total || self.done % every.max(1) == 0 {
            log::info!("{}: {}/{}", self.name, self.done, self.total);
        }
    }

    pub fn done(&self) -> usize {
        self.done
    }

    /// Logs the total elapsed time.
    pub fn finish(self) {
        log::info!(
            "{}: finished {}/{} in {:.2?}",
            self.name,
            self.done,
            self.total,
            self.start.elapsed()
        );
    }
}
