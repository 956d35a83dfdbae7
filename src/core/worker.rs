// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Routine run by each worker thread.

use super::observer::{IntervalObserver, RunStats};
use super::sync::{Coordinator, SharedContext};
use crate::kernel::{refine, Interval, Step};
use crate::macros::{log_debug, log_error};
#[cfg(feature = "log_parallelism")]
use crate::macros::log_trace;
use std::sync::Arc;

/// Context object owned by a worker thread.
pub struct ThreadContext<'a, F, O> {
    /// Thread index.
    id: usize,
    /// Integrand.
    f: &'a F,
    /// Relative tolerance.
    eps: f64,
    /// Number of splits between two attempts to offload work.
    iteration_span: u32,
    /// Number of splits performed by this thread so far.
    iterations: u32,
    /// Intervals that this thread still has to process locally.
    local: Vec<Interval>,
    /// Statistics for this thread.
    stats: RunStats,
    /// Context shared with the other worker threads.
    shared: Arc<SharedContext>,
    /// Receiver of the instrumentation events.
    observer: &'a O,
}

impl<'a, F, O> ThreadContext<'a, F, O>
where
    F: Fn(f64) -> f64,
    O: IntervalObserver,
{
    /// Creates the context of the worker thread with the given index.
    pub fn new(
        id: usize,
        f: &'a F,
        eps: f64,
        iteration_span: u32,
        shared: Arc<SharedContext>,
        observer: &'a O,
    ) -> Self {
        Self {
            id,
            f,
            eps,
            iteration_span,
            iterations: 0,
            local: Vec::new(),
            stats: RunStats::default(),
            shared,
            observer,
        }
    }

    /// Main function run by this thread, starting on the slice `[from, to]`.
    ///
    /// An empty slice contributes nothing, but the thread still takes part in
    /// the work sharing.
    pub fn run(mut self, from: f64, to: f64) {
        let shared = self.shared.clone();
        let _notifier = PanicNotifier {
            id: self.id,
            coordinator: &shared.coordinator,
        };

        let mut sum = 0.0;
        if from < to {
            log_debug!("[thread {}] Initial task [{from}; {to}]", self.id);
            sum += self.process(Interval::new(self.f, from, to));
        }

        while let Some(interval) = shared.coordinator.wait_for_work(self.id, &mut self.stats) {
            #[cfg(feature = "log_parallelism")]
            log_trace!(
                "[thread {}] Claimed [{}; {}]",
                self.id,
                interval.a,
                interval.b
            );
            self.observer.claimed(self.id, &interval);
            sum += self.process(interval);
        }

        log_debug!("[thread {}] Completed with partial result {sum}", self.id);
        shared.result.fold(sum, &self.stats);
    }

    /// Integrates over the given interval, returning its contribution.
    ///
    /// Left halves are either offloaded to the shared stack or kept on the
    /// local stack, and the right half is always processed next.
    fn process(&mut self, interval: Interval) -> f64 {
        let mut current = interval;
        let mut sum = 0.0;
        loop {
            self.stats.steps += 1;
            match refine(self.f, &current, self.eps) {
                Step::Converged(value) => {
                    self.observer.converged(self.id, &current, value);
                    sum += value;
                    match self.local.pop() {
                        Some(next) => current = next,
                        None => return sum,
                    }
                }
                Step::Split(left, right) => {
                    if !(self.should_offload() && self.offload(left)) {
                        self.local.push(left);
                    }
                    current = right;
                }
            }
        }
    }

    /// Counts one more split, and returns whether this thread should try to
    /// share work at this point.
    fn should_offload(&mut self) -> bool {
        self.iterations = self.iterations.wrapping_add(1);
        self.iterations % self.iteration_span == 0
    }

    /// Attempts to publish the given interval to the other threads.
    fn offload(&mut self, interval: Interval) -> bool {
        if !self.shared.coordinator.try_offload(interval) {
            return false;
        }
        #[cfg(feature = "log_parallelism")]
        log_trace!(
            "[thread {}] Offloaded [{}; {}]",
            self.id,
            interval.a,
            interval.b
        );
        self.stats.offloads += 1;
        self.observer.offloaded(self.id, &interval);
        true
    }
}

/// Object whose destructor releases the other worker threads if this thread
/// panics, so that they don't wait forever for its work.
struct PanicNotifier<'a> {
    /// Thread index.
    #[cfg_attr(not(feature = "log"), allow(dead_code))]
    id: usize,
    /// Coordinator shared with the other worker threads.
    coordinator: &'a Coordinator,
}

impl Drop for PanicNotifier<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log_error!(
                "[thread {}] Detected panic in this thread, releasing the other threads",
                self.id
            );
            self.coordinator.abort();
        }
    }
}
